use bytes::Bytes;
use tracing::{debug, warn};

use crate::pool::{ConnectionError, PooledConnection};
use crate::protocol::{error_code, Packet};

use super::RwSplitSession;

/// Completion callback: `(success, response packets)`
pub type Callback = Box<dyn FnOnce(bool, &[Packet]) + Send>;

/// Per-statement execution on a read/write-split session
///
/// Created for every call to [`RwSplitSession::execute`] or
/// [`RwSplitSession::execute_hint`] and consumed when the statement
/// completes.
pub struct RwSplitHandler {
    origin: Option<Bytes>,
    callback: Option<Callback>,
}

impl RwSplitHandler {
    /// `origin` is the client's command payload; without one the session's
    /// current statement is sent as `COM_QUERY`
    pub fn new(origin: Option<Bytes>, callback: Option<Callback>) -> Self {
        Self { origin, callback }
    }

    /// Bind the acquired connection, then run the statement on it
    pub(crate) async fn connection_acquired(self, session: &mut RwSplitSession, conn: PooledConnection) {
        debug!(
            session_id = session.id(),
            conn_id = conn.id(),
            instance = %conn.instance_name(),
            "Backend connection acquired"
        );
        session.bind(conn);
        self.execute(session).await;
    }

    /// Report an acquisition failure to the client
    pub(crate) fn connection_error(self, session: &mut RwSplitSession, instance: &str, err: &ConnectionError) {
        warn!(session_id = session.id(), instance = %instance, error = %err, "Backend connection unavailable");
        session.write_error(
            error_code::ER_UNKNOWN_ERROR,
            "HY000",
            &format!("can't get connection from instance {}: {}", instance, err),
        );
        self.complete(false, &[]);
    }

    /// Run the statement on the session's bound connection
    pub(crate) async fn execute(self, session: &mut RwSplitSession) {
        let request = match &self.origin {
            Some(origin) => origin.clone(),
            None => Packet::query(session.current_sql()).payload,
        };

        let Some(conn) = session.bound_connection_mut() else {
            session.write_error(error_code::ER_UNKNOWN_ERROR, "HY000", "no backend connection bound");
            self.complete(false, &[]);
            return;
        };
        let conn_id = conn.id();
        let result = conn.execute(request).await;

        match result {
            Ok(packets) => {
                let success = packets.first().map_or(false, |p| !p.is_err());
                for packet in &packets {
                    session.write_packet(packet.clone());
                }
                debug!(session_id = session.id(), conn_id, success, packets = packets.len(), "Statement completed");
                self.complete(success, &packets);
            }
            Err(e) => {
                warn!(session_id = session.id(), conn_id, error = %e, "Statement failed on backend");
                session.write_error(
                    error_code::ER_UNKNOWN_ERROR,
                    "HY000",
                    &format!("backend connection failed: {}", e),
                );
                self.complete(false, &[]);
            }
        }
    }

    /// Complete without running anything
    pub(crate) fn fail(self) {
        self.complete(false, &[]);
    }

    fn complete(self, success: bool, response: &[Packet]) {
        if let Some(callback) = self.callback {
            callback(success, response);
        }
    }
}
