use std::fmt;

use crate::parser::StatementType;

use super::rw_split::RouteTarget;

/// Where and how a statement should execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Sharding node the statement is sent to
    pub node: String,
    /// Statement text to execute on the node (directive stripped)
    pub statement: String,
    /// Type of the executed statement
    pub stmt_type: StatementType,
    /// Whether a replica may serve the statement
    pub run_on_slave: bool,
    /// Whether a directive pinned the statement to the primary
    pub force_master: bool,
    /// Whether the decision may be reused for identical statements
    pub cacheable: bool,
}

impl RouteDecision {
    pub fn new(
        node: impl Into<String>,
        statement: impl Into<String>,
        stmt_type: StatementType,
    ) -> Self {
        Self {
            node: node.into(),
            statement: statement.into(),
            stmt_type,
            run_on_slave: false,
            force_master: false,
            cacheable: false,
        }
    }

    /// Master/slave side the decision resolves to
    pub fn target(&self) -> RouteTarget {
        if self.run_on_slave && !self.force_master {
            RouteTarget::Slave
        } else {
            RouteTarget::Master
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node={} target={} type={} cacheable={} sql={}",
            self.node,
            self.target(),
            self.stmt_type.as_str(),
            self.cacheable,
            self.statement
        )
    }
}
