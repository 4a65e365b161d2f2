use std::fmt;

use crate::parser::StatementType;

/// Read-write routing decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Route to master (for writes or when in transaction)
    Master,
    /// Route to slave (for reads outside transaction)
    Slave,
}

impl RouteTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTarget::Master => "master",
            RouteTarget::Slave => "slave",
        }
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-write splitter
pub struct RwSplitter;

impl RwSplitter {
    /// Determine routing target based on statement type and transaction state
    ///
    /// Only read-only statements outside a transaction may use a slave.
    pub fn route(stmt_type: StatementType, in_transaction: bool) -> RouteTarget {
        if in_transaction || !stmt_type.is_read_only() {
            RouteTarget::Master
        } else {
            RouteTarget::Slave
        }
    }

    /// Check if a statement should be routed to slave
    pub fn can_use_slave(stmt_type: StatementType, in_transaction: bool) -> bool {
        Self::route(stmt_type, in_transaction) == RouteTarget::Slave
    }
}
