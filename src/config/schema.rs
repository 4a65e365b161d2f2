use std::time::Duration;

use serde::Deserialize;

use crate::hint::DEFAULT_ANNOTATION;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Route decision settings
    #[serde(default)]
    pub route: RouteConfig,
    /// Backend connection pool settings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Logical schemas and the sharding nodes they route to
    #[serde(default)]
    pub schemas: Vec<SchemaConfig>,
    /// Read/write-split backend groups
    #[serde(default)]
    pub db_groups: Vec<DbGroupConfig>,
}

impl Config {
    pub fn schema(&self, name: &str) -> Option<&SchemaConfig> {
        self.schemas.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Route Configuration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Literal identifying structured directives (`/*!dble:type=value*/`)
    #[serde(default = "default_annotation")]
    pub annotation: String,
    /// Whether SELECT route decisions are cached
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// Maximum number of cached decisions (further inserts are skipped)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_annotation() -> String {
    DEFAULT_ANNOTATION.to_string()
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    10_000
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            annotation: default_annotation(),
            cache_enabled: default_cache_enabled(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

// ============================================================================
// Pool Configuration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of idle connections kept per instance
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
    /// Maximum connection age before recycling (seconds)
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Maximum idle time before closing (seconds)
    #[serde(default = "default_max_idle_time_secs")]
    pub max_idle_time_secs: u64,
}

fn default_max_idle() -> usize {
    10
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_max_idle_time_secs() -> u64 {
    300
}

impl PoolConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn max_idle_time(&self) -> Duration {
        Duration::from_secs(self.max_idle_time_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: default_max_idle(),
            max_age_secs: default_max_age_secs(),
            max_idle_time_secs: default_max_idle_time_secs(),
        }
    }
}

// ============================================================================
// Schema / DbGroup / DbInstance Configuration
// ============================================================================

/// Logical schema as seen by clients
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    /// Node receiving statements without a more specific route
    pub default_node: String,
    /// Sharding nodes this schema may route to
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl SchemaConfig {
    pub fn new(name: impl Into<String>, default_node: impl Into<String>) -> Self {
        let default_node = default_node.into();
        Self {
            name: name.into(),
            nodes: vec![default_node.clone()],
            default_node,
        }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Whether `node` belongs to this schema
    pub fn contains_node(&self, node: &str) -> bool {
        self.default_node == node || self.nodes.iter().any(|n| n == node)
    }
}

/// Replica selection policy within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    #[default]
    RoundRobin,
    /// Weight-proportional random choice
    Random,
}

/// Backend group: one primary plus read replicas
#[derive(Debug, Clone, Deserialize)]
pub struct DbGroupConfig {
    pub name: String,
    #[serde(default)]
    pub balance: BalanceMode,
    pub instances: Vec<DbInstanceConfig>,
}

/// Individual MySQL server
#[derive(Debug, Clone, Deserialize)]
pub struct DbInstanceConfig {
    /// Instance name (target of `uproxy_dest` directives)
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub role: DbInstanceRole,
    /// Relative weight for random replica selection
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl DbInstanceConfig {
    pub fn new(name: impl Into<String>, role: DbInstanceRole) -> Self {
        Self {
            name: name.into(),
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: None,
            role,
            weight: default_weight(),
        }
    }

    /// Address string (host:port)
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Role of an instance in its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbInstanceRole {
    #[default]
    Master,
    Slave,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            pool: PoolConfig::default(),
            schemas: vec![SchemaConfig::new("test", "dn1")],
            db_groups: vec![DbGroupConfig {
                name: "default".to_string(),
                balance: BalanceMode::default(),
                instances: vec![DbInstanceConfig::new("m1", DbInstanceRole::Master)],
            }],
        }
    }
}
