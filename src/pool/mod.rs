mod connection;
mod group;
mod instance;

pub use connection::{BackendConnection, ConnectionError, ConnectionState, Connector, PooledConnection};
pub use group::{DbGroup, FirstSelector, InstanceSelector, RoundRobinSelector, WeightedRandomSelector};
pub use instance::{Acquisition, DbInstance};
