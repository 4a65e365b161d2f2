//! Hint-aware route decisions and sticky backend connection binding for a
//! MySQL read/write-splitting proxy.

pub mod config;
pub mod hint;
pub mod metrics;
pub mod parser;
pub mod pool;
pub mod protocol;
pub mod router;
pub mod session;
