use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_DB_PATH: &str = "./tracker.db";
pub const DEFAULT_CONFIG_PATH: &str = "./tracker.toml";
pub const DEFAULT_MAILBOX_CAPACITY: usize = 10; // pending events per subscriber before drops
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

/// Top-level config (tracker.toml + TRACKER_* env overrides).
///
/// Nested keys use a double underscore in env vars, e.g.
/// `TRACKER_SYNC__MAILBOX_CAPACITY=32`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Event stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bounded mailbox size per connected stream. Events published while a
    /// mailbox is full are dropped for that subscriber only.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Interval between SSE keep-alive comments. 0 disables them.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}
fn default_mailbox_capacity() -> usize {
    DEFAULT_MAILBOX_CAPACITY
}
fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

impl TrackerConfig {
    /// Load config from a TOML file with TRACKER_* env var overrides.
    ///
    /// A missing file is not an error: every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        debug!(path, "loading config");

        Self::extract(
            Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed("TRACKER_").split("__")),
        )
    }

    /// Extract and validate a config from an already-assembled figment.
    pub fn extract(figment: Figment) -> Result<Self> {
        let config: TrackerConfig = figment
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sync.mailbox_capacity == 0 {
            return Err(CoreError::InvalidValue {
                field: "sync.mailbox_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// `bind:port` string suitable for `SocketAddr` parsing.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_defaults() {
        let config = TrackerConfig::extract(Figment::new()).expect("defaults");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.listen_addr(), "0.0.0.0:80");
        assert_eq!(config.sync.mailbox_capacity, 10);
        assert_eq!(config.database.path, DEFAULT_DB_PATH);
    }

    #[test]
    fn toml_overrides_sync_section() {
        let toml = r#"
            [server]
            port = 8080

            [sync]
            mailbox_capacity = 32
            keep_alive_secs = 0
        "#;
        let config = TrackerConfig::extract(Figment::new().merge(Toml::string(toml))).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.sync.mailbox_capacity, 32);
        assert_eq!(config.sync.keep_alive_secs, 0);
    }

    #[test]
    fn zero_mailbox_capacity_is_rejected() {
        let toml = "[sync]\nmailbox_capacity = 0\n";
        let err = TrackerConfig::extract(Figment::new().merge(Toml::string(toml))).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidValue {
                field: "sync.mailbox_capacity",
                ..
            }
        ));
    }
}
