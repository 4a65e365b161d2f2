use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::{DbInstanceConfig, DbInstanceRole, PoolConfig};
use crate::metrics::metrics;

use super::connection::{ConnectionError, Connector, PooledConnection};

/// A single backend server and its idle connections
///
/// Connections are borrowed through [`DbInstance::acquire_connection`] and
/// come back through [`PooledConnection::release`].
pub struct DbInstance {
    config: Arc<DbInstanceConfig>,
    pool: PoolConfig,
    connector: Arc<dyn Connector>,
    idle: Mutex<VecDeque<PooledConnection>>,
    me: Weak<DbInstance>,
}

impl DbInstance {
    pub fn new(
        config: DbInstanceConfig,
        pool: PoolConfig,
        connector: Arc<dyn Connector>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            config: Arc::new(config),
            pool,
            connector,
            idle: Mutex::new(VecDeque::new()),
            me: me.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DbInstanceConfig {
        &self.config
    }

    pub fn is_master(&self) -> bool {
        self.config.role == DbInstanceRole::Master
    }

    pub fn weight(&self) -> u32 {
        self.config.weight
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Request a connection scoped to `schema`
    ///
    /// Returns at once; the connection (or the failure) is delivered exactly
    /// once through the returned [`Acquisition`]. An exclusive request always
    /// opens a fresh connection instead of reusing an idle one.
    pub fn acquire_connection(&self, schema: Option<&str>, exclusive: bool) -> Acquisition {
        let (tx, rx) = oneshot::channel();
        let me = self.me.clone();
        let schema = schema.map(str::to_string);

        tokio::spawn(async move {
            // A vanished instance drops `tx`, which the receiver sees as canceled
            let Some(instance) = me.upgrade() else {
                return;
            };
            let result = instance.get(schema, exclusive).await;
            if let Err(e) = &result {
                warn!(instance = %instance.name(), error = %e, "Failed to acquire backend connection");
                metrics().record_acquire_failure(instance.name());
            }
            // Requester went away; keep the connection for the next caller
            if let Err(Ok(conn)) = tx.send(result) {
                debug!(conn_id = conn.id(), "Acquisition dropped, returning connection to pool");
                conn.release();
            }
        });

        Acquisition {
            instance: self.config.name.clone(),
            rx,
        }
    }

    async fn get(
        &self,
        schema: Option<String>,
        exclusive: bool,
    ) -> Result<PooledConnection, ConnectionError> {
        if !exclusive {
            if let Some(mut conn) = self.take_idle(schema.as_deref()) {
                conn.acquire();
                debug!(instance = %self.name(), conn_id = conn.id(), "Reusing idle connection");
                return Ok(conn);
            }
        }

        debug!(instance = %self.name(), "Creating new connection");
        let inner = self
            .connector
            .connect(Arc::clone(&self.config), schema.clone())
            .await?;
        let mut conn = PooledConnection::new(inner, schema, self.me.clone(), self.config.name.clone());
        conn.acquire();
        Ok(conn)
    }

    fn take_idle(&self, schema: Option<&str>) -> Option<PooledConnection> {
        let mut idle = self.idle.lock();
        idle.retain(|conn| {
            let keep = conn.is_usable()
                && !conn.is_expired(self.pool.max_age())
                && !conn.is_idle_too_long(self.pool.max_idle_time());
            if !keep {
                debug!(conn_id = conn.id(), "Discarding stale idle connection");
            }
            keep
        });

        let pos = idle.iter().position(|conn| conn.schema() == schema)?;
        idle.remove(pos)
    }

    /// Return a connection to the idle queue
    ///
    /// Closed or expired connections are dropped, as is anything beyond
    /// `max_idle`.
    pub(crate) fn put(&self, mut conn: PooledConnection) {
        conn.mark_idle();

        if !conn.is_usable() {
            debug!(conn_id = conn.id(), "Connection not usable, discarding");
            return;
        }

        if conn.is_expired(self.pool.max_age()) {
            debug!(conn_id = conn.id(), "Connection expired, discarding");
            conn.close("expired");
            return;
        }

        let mut idle = self.idle.lock();
        if idle.len() >= self.pool.max_idle {
            debug!(conn_id = conn.id(), "Pool full, discarding connection");
            conn.close("pool full");
            return;
        }

        idle.push_back(conn);
        debug!(instance = %self.name(), idle_count = idle.len(), "Returned connection to pool");
    }
}

/// Pending connection acquisition
///
/// Resolves once, with the connection or the reason none could be supplied.
pub struct Acquisition {
    instance: String,
    rx: oneshot::Receiver<Result<PooledConnection, ConnectionError>>,
}

impl Acquisition {
    /// Name of the instance the connection is requested from
    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl Future for Acquisition {
    type Output = Result<PooledConnection, ConnectionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ConnectionError::Canceled)))
    }
}
