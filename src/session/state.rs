/// Session state tracking
///
/// Owned by the client-facing session and updated by the statement layer as
/// statements complete. The binding logic only reads these flags.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Client username
    pub username: String,
    /// Current schema
    pub schema: Option<String>,
    /// `autocommit` session variable
    pub autocommit: bool,
    /// Explicit `LOCK TABLES` held
    pub locked: bool,
    /// `BEGIN` / `START TRANSACTION` seen without a matching end
    pub tx_started: bool,
    /// `LOAD DATA` exchange in progress
    pub in_load_data: bool,
    /// Prepared statement sequence in progress
    pub in_prepare: bool,
    /// Client capability flags
    pub capability_flags: u32,
    /// Statements of a multi-statement batch not yet routed
    remaining_sql: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            username: String::new(),
            schema: None,
            autocommit: true,
            locked: false,
            tx_started: false,
            in_load_data: false,
            in_prepare: false,
            capability_flags: crate::protocol::CLIENT_PROTOCOL_41,
            remaining_sql: None,
        }
    }
}

impl SessionState {
    pub fn new(username: impl Into<String>, schema: Option<String>) -> Self {
        Self {
            username: username.into(),
            schema,
            ..Default::default()
        }
    }

    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_tx_started(&self) -> bool {
        self.tx_started
    }

    pub fn is_in_load_data(&self) -> bool {
        self.in_load_data
    }

    pub fn is_in_prepare(&self) -> bool {
        self.in_prepare
    }

    /// Whether statements must stay on the primary
    pub fn in_transaction(&self) -> bool {
        self.tx_started || !self.autocommit
    }

    /// Whether a backend connection may leave this session
    pub fn is_idle(&self) -> bool {
        self.autocommit && !self.locked && !self.tx_started && !self.in_load_data && !self.in_prepare
    }

    /// Start a transaction
    pub fn begin_transaction(&mut self) {
        self.tx_started = true;
    }

    /// End a transaction
    pub fn end_transaction(&mut self) {
        self.tx_started = false;
    }

    /// Record statements still waiting in a multi-statement batch
    pub fn set_remaining_sql(&mut self, sql: Option<String>) {
        self.remaining_sql = sql.filter(|s| !s.trim().is_empty());
    }

    pub fn remaining_sql(&self) -> Option<&str> {
        self.remaining_sql.as_deref()
    }

    pub fn has_remaining_sql(&self) -> bool {
        self.remaining_sql.is_some()
    }

    /// Stop multi-statement bookkeeping for the current statement
    pub fn end_parse(&mut self) {
        self.remaining_sql = None;
    }
}
