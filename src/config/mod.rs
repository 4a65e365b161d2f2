mod schema;

pub use schema::*;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the first readable config among `paths`, or the built-in default
///
/// A file that exists but fails to parse is an error rather than a reason to
/// silently fall back.
pub fn load_or_default<P: AsRef<Path>>(paths: &[P]) -> Result<(Option<PathBuf>, Config), ConfigError> {
    for path in paths {
        let path = path.as_ref();
        match load_config(path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                return Ok((Some(path.to_path_buf()), config));
            }
            Err(ConfigError::IoError(e)) => {
                warn!(path = %path.display(), error = %e, "Config file not readable");
            }
            Err(e) => return Err(e),
        }
    }

    info!("Using default configuration");
    Ok((None, Config::default()))
}

impl Config {
    /// Check cross-references the deserializer cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        for schema in &self.schemas {
            if schema.default_node.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "schema '{}' has no default_node",
                    schema.name
                )));
            }
        }
        for group in &self.db_groups {
            if !group
                .instances
                .iter()
                .any(|i| i.role == DbInstanceRole::Master)
            {
                return Err(ConfigError::Invalid(format!(
                    "db_group '{}' has no master instance",
                    group.name
                )));
            }
        }
        Ok(())
    }
}
