//! TOML file configuration structures.
//!
//! These structs directly map to the `orderstream.toml` file format.
//! Every field has a default so a missing file or section still yields
//! a runnable configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// The address and port to listen on (e.g., "0.0.0.0:8000").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

/// Database pool bounds. The connection URL itself comes from the
/// `DATABASE_URL` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_min_connections() -> u32 {
    5
}

fn default_max_connections() -> u32 {
    20
}

/// Propagation pipeline timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Change-log poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Heartbeat broadcast interval in seconds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

impl FileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.pipeline.heartbeat_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[database]
min_connections = 2
max_connections = 8

[pipeline]
poll_interval_ms = 250
heartbeat_interval_secs = 10
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8000);
        assert_eq!(config.database.min_connections, 5);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    }
}
