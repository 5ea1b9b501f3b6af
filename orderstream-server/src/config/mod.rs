//! Configuration module for orderstream-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments,
//! and environment variables.

pub mod file;

use file::FileConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file (built-in defaults apply when it is absent)
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let mut config = if self.config_path.exists() {
            let content = std::fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!(
                path = %self.config_path.display(),
                "config file not found, using defaults"
            );
            FileConfig::default()
        };

        if let Some(listen) = self.listen_override {
            config.server.listen = listen;
        }

        self.validate(&config)?;
        Ok(config)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.pipeline.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "pipeline.poll_interval_ms must be at least 1".into(),
            ));
        }
        if config.pipeline.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "pipeline.heartbeat_interval_secs must be at least 1".into(),
            ));
        }
        if config.database.max_connections == 0
            || config.database.min_connections > config.database.max_connections
        {
            return Err(ConfigError::Validation(
                "database connection bounds are invalid".into(),
            ));
        }
        Ok(())
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let loader = ConfigLoader::new("/nonexistent/orderstream.toml", None);
        let mut config = FileConfig::default();
        config.pipeline.poll_interval_ms = 0;
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_inverted_pool_bounds_are_rejected() {
        let loader = ConfigLoader::new("/nonexistent/orderstream.toml", None);
        let mut config = FileConfig::default();
        config.database.min_connections = 30;
        config.database.max_connections = 10;
        assert!(loader.validate(&config).is_err());
    }
}
