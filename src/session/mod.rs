mod handler;
mod state;

pub use handler::{Callback, RwSplitHandler};
pub use state::SessionState;

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::metrics::metrics;
use crate::parser::StatementType;
use crate::pool::{DbGroup, DbInstance, PooledConnection};
use crate::protocol::{error_code, ErrPacket, Packet};
use crate::router::{RouteError, RouteService};

/// Longest statement prefix written to logs and diagnostics
pub const MAX_SQL_LOG_LEN: usize = 1024;

/// Outbound packet stream to the client
pub type ClientWriter = mpsc::UnboundedSender<Packet>;

/// Client session of a read/write-split backend group
///
/// Holds at most one pinned backend connection. The pin is kept while the
/// session is inside a transaction, holds locks, or is mid load-data or
/// prepare, and is dropped by [`RwSplitSession::release_if_safe`] once none
/// of those hold.
pub struct RwSplitSession {
    id: u32,
    /// Session state
    pub state: SessionState,
    conn: Option<PooledConnection>,
    group: Arc<DbGroup>,
    router: Arc<RouteService>,
    client: ClientWriter,
    current_sql: String,
}

impl RwSplitSession {
    pub fn new(
        id: u32,
        state: SessionState,
        group: Arc<DbGroup>,
        router: Arc<RouteService>,
        client: ClientWriter,
    ) -> Self {
        Self {
            id,
            state,
            conn: None,
            group,
            router,
            client,
            current_sql: String::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn group(&self) -> &Arc<DbGroup> {
        &self.group
    }

    /// Statement sent when a handler carries no original payload
    pub fn current_sql(&self) -> &str {
        &self.current_sql
    }

    pub fn set_current_sql(&mut self, sql: impl Into<String>) {
        self.current_sql = sql.into();
    }

    pub fn is_bound(&self) -> bool {
        self.conn.is_some()
    }

    pub fn bound_connection(&self) -> Option<&PooledConnection> {
        self.conn.as_ref()
    }

    pub(crate) fn bound_connection_mut(&mut self) -> Option<&mut PooledConnection> {
        self.conn.as_mut()
    }

    /// Run the current statement on the primary (`master`) or a replica
    ///
    /// A usable pinned connection is reused; otherwise one is acquired from
    /// the instance the group selects.
    #[instrument(skip(self, origin, callback), fields(session_id = self.id))]
    pub async fn execute(&mut self, master: bool, origin: Option<Bytes>, callback: Option<Callback>) {
        let handler = RwSplitHandler::new(origin, callback);
        if self.has_usable_binding() {
            handler.execute(self).await;
            return;
        }

        match self.group.select(master) {
            Some(instance) => self.acquire_and_execute(instance, handler).await,
            None => {
                let message = format!("no instance available in group {}", self.group.name());
                warn!(session_id = self.id, "{}", message);
                self.write_error(error_code::ER_UNKNOWN_ERROR, "HY000", &message);
                handler.fail();
            }
        }
    }

    /// Run `sql`, honoring any routing directive it carries
    ///
    /// Routing errors are answered with an ERR packet. When the group has
    /// no instance to offer nothing is executed.
    #[instrument(skip(self, sql, callback), fields(session_id = self.id))]
    pub async fn execute_hint(&mut self, stmt_type: StatementType, sql: &str, callback: Option<Callback>) {
        self.current_sql = sql.to_string();
        let handler = RwSplitHandler::new(None, callback);
        if self.has_usable_binding() {
            handler.execute(self).await;
            return;
        }

        let instance = match self
            .router
            .route_rw_split(stmt_type, sql, &self.state, &self.group)
        {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                debug!(session_id = self.id, "No instance for statement, skipping");
                return;
            }
            Err(e) => {
                self.write_exception(sql, &e);
                return;
            }
        };

        self.acquire_and_execute(instance, handler).await;
    }

    async fn acquire_and_execute(&mut self, instance: Arc<DbInstance>, handler: RwSplitHandler) {
        let acquisition = instance.acquire_connection(self.state.schema.as_deref(), false);
        match acquisition.await {
            Ok(conn) => handler.connection_acquired(self, conn).await,
            Err(e) => handler.connection_error(self, instance.name(), &e),
        }
    }

    /// Whether a pinned connection can serve the next statement
    ///
    /// A pinned connection that has since closed is dropped from the session.
    fn has_usable_binding(&mut self) -> bool {
        let closed_id = match &self.conn {
            Some(conn) if conn.is_usable() => return true,
            Some(conn) => conn.id(),
            None => return false,
        };
        debug!(session_id = self.id, conn_id = closed_id, "Pinned connection closed, acquiring a new one");
        self.conn = None;
        false
    }

    /// Pin `conn` to this session
    ///
    /// A different connection already pinned is overwritten, not released.
    pub fn bind(&mut self, conn: PooledConnection) {
        if let Some(old) = &self.conn {
            if old.id() != conn.id() {
                warn!(
                    session_id = self.id,
                    old_conn_id = old.id(),
                    new_conn_id = conn.id(),
                    "Binding a connection while another is still bound"
                );
                metrics().record_binding("overwrite");
            }
        }
        metrics().record_binding("bind");
        self.conn = Some(conn);
    }

    /// Release the pinned connection to its pool when the session is idle
    ///
    /// Returns `true` when a connection was released.
    pub fn release_if_safe(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        match self.conn.take() {
            Some(conn) => {
                debug!(session_id = self.id, conn_id = conn.id(), "Releasing pinned connection");
                conn.release();
                metrics().record_binding("release");
                true
            }
            None => false,
        }
    }

    /// Drop the pin without returning the connection to its pool
    pub fn unbind(&mut self) -> Option<PooledConnection> {
        let conn = self.conn.take();
        if conn.is_some() {
            metrics().record_binding("unbind");
        }
        conn
    }

    /// Close the pinned connection, if any
    pub fn close(&mut self, reason: &str) {
        if let Some(conn) = self.conn.as_mut() {
            conn.close(reason);
        }
    }

    /// Answer a routing failure with an ERR packet
    fn write_exception(&mut self, sql: &str, err: &RouteError) {
        let (code, sql_state, message) = error_fields(err);
        warn!(
            session_id = self.id,
            code,
            sql_state = %sql_state,
            sql = %truncate_sql(sql, MAX_SQL_LOG_LEN),
            error = %message,
            "Hint routing failed"
        );
        self.write_error(code, &sql_state, &message);
    }

    pub(crate) fn write_error(&mut self, code: u16, sql_state: &str, message: &str) {
        metrics().record_session_error(code);
        let packet = ErrPacket::new(code, sql_state, message).encode(1, self.state.capability_flags);
        self.write_packet(packet);
    }

    pub(crate) fn write_packet(&self, packet: Packet) {
        if self.client.send(packet).is_err() {
            debug!(session_id = self.id, "Client writer closed, dropping packet");
        }
    }
}

/// Error code, SQL state and message reported for a routing failure
///
/// Errors without a vendor code report `ER_PARSE_ERROR`; a missing SQL
/// state becomes `HY000` and a missing message the error kind.
pub fn error_fields(err: &RouteError) -> (u16, String, String) {
    let code = match err.vendor_code() {
        0 => error_code::ER_PARSE_ERROR,
        code => code,
    };
    let sql_state = err
        .sql_state()
        .filter(|s| !s.is_empty())
        .unwrap_or("HY000")
        .to_string();
    let message = err
        .message()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| err.kind_name().to_string());
    (code, sql_state, message)
}

/// Truncate SQL for logging (avoid huge log entries)
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_sql(sql: &str, max_chars: usize) -> Cow<'_, str> {
    match sql.char_indices().nth(max_chars) {
        None => Cow::Borrowed(sql),
        Some((idx, _)) => Cow::Owned(format!("{}...", &sql[..idx])),
    }
}
