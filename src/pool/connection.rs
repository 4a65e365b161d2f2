use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::DbInstanceConfig;
use crate::protocol::Packet;

use super::instance::DbInstance;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is available for use
    Idle,
    /// Connection is currently in use
    InUse,
    /// Connection is broken/closed
    Closed,
}

/// A live session with a backend MySQL server
///
/// Framing and authentication live behind this trait; callers exchange
/// whole command payloads for the response packets they produce.
pub trait BackendConnection: Send {
    fn id(&self) -> u64;

    /// Send one command payload and collect its response packets
    fn execute(&mut self, request: Bytes) -> BoxFuture<'_, Result<Vec<Packet>, ConnectionError>>;

    fn is_closed(&self) -> bool;

    fn close(&mut self, reason: &str);
}

/// Opens backend connections for an instance
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        config: Arc<DbInstanceConfig>,
        schema: Option<String>,
    ) -> BoxFuture<'static, Result<Box<dyn BackendConnection>, ConnectionError>>;
}

/// A backend connection checked out of a [`DbInstance`]
pub struct PooledConnection {
    inner: Box<dyn BackendConnection>,
    state: ConnectionState,
    created_at: Instant,
    last_used_at: Instant,
    schema: Option<String>,
    owner: Weak<DbInstance>,
    instance_name: String,
}

impl PooledConnection {
    pub(crate) fn new(
        inner: Box<dyn BackendConnection>,
        schema: Option<String>,
        owner: Weak<DbInstance>,
        instance_name: String,
    ) -> Self {
        let now = Instant::now();
        Self {
            inner,
            state: ConnectionState::Idle,
            created_at: now,
            last_used_at: now,
            schema,
            owner,
            instance_name,
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    /// Name of the instance this connection belongs to
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connection has exceeded max age
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.created_at.elapsed() > max_age
    }

    /// Check if connection has been idle too long
    pub fn is_idle_too_long(&self, max_idle: Duration) -> bool {
        self.last_used_at.elapsed() > max_idle
    }

    /// Check if connection is usable
    pub fn is_usable(&self) -> bool {
        self.state != ConnectionState::Closed && !self.inner.is_closed()
    }

    /// Mark connection as in use
    pub(crate) fn acquire(&mut self) {
        self.state = ConnectionState::InUse;
        self.last_used_at = Instant::now();
    }

    /// Mark connection as available
    pub(crate) fn mark_idle(&mut self) {
        self.state = ConnectionState::Idle;
        self.last_used_at = Instant::now();
    }

    /// Run one command on the backend
    ///
    /// A failed exchange leaves the connection closed.
    pub async fn execute(&mut self, request: Bytes) -> Result<Vec<Packet>, ConnectionError> {
        if !self.is_usable() {
            return Err(ConnectionError::Closed);
        }
        self.last_used_at = Instant::now();
        match self.inner.execute(request).await {
            Ok(packets) => Ok(packets),
            Err(e) => {
                warn!(conn_id = self.id(), error = %e, "Backend exchange failed, closing connection");
                self.close("backend exchange failed");
                Err(e)
            }
        }
    }

    /// Close the underlying connection
    pub fn close(&mut self, reason: &str) {
        if self.state != ConnectionState::Closed {
            debug!(conn_id = self.id(), reason = %reason, "Closing backend connection");
            self.state = ConnectionState::Closed;
            self.inner.close(reason);
        }
    }

    /// Hand the connection back to its instance's idle queue
    pub fn release(self) {
        match self.owner.upgrade() {
            Some(owner) => owner.put(self),
            None => debug!(conn_id = self.id(), "Owning instance gone, dropping connection"),
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id())
            .field("instance", &self.instance_name)
            .field("schema", &self.schema)
            .field("state", &self.state)
            .finish()
    }
}

/// Connection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection disconnected")]
    Disconnected,

    #[error("Connection closed")]
    Closed,

    #[error("Connection acquisition canceled")]
    Canceled,
}
