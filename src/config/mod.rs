//! # Configuration
//!
//! TOML configuration for the livemud server. Every section has defaults, so
//! a partial file (or none, via `livemud init`) is enough to start.
//!
//! ## Sections
//!
//! - [`ServerConfig`] - listener address, output protocol, start room
//! - [`StorageConfig`] - where the sled world lives
//! - [`LoggingConfig`] - level and optional log file
//! - [`SessionConfig`] - history capacity and the away/shutdown timers
//! - [`CommandConfig`] - the per-command watchdog timeout
//! - [`TransactionConfig`] - retry bound and backoff unit for world transactions
//!
//! ```toml
//! [server]
//! name = "livemud"
//! bind = "127.0.0.1:4000"
//! protocol = "text"
//! start_room = "town_square"
//!
//! [session]
//! away_timeout_ms = 300000
//! shutdown_timeout_ms = 900000
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::world::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub transactions: TransactionConfig,
}

/// How messages are written to front-end connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// ANSI-coloured text lines.
    #[default]
    Text,
    /// One JSON-encoded message per line.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub bind: String,
    pub protocol: Protocol,
    /// Room new players are created in.
    pub start_room: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "livemud".to_string(),
            bind: "127.0.0.1:4000".to_string(),
            protocol: Protocol::Text,
            start_room: crate::world::START_ROOM_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/world".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub history_capacity: usize,
    /// Time with no sinks attached before a player is marked away.
    pub away_timeout_ms: u64,
    /// Time spent away before the actor shuts down.
    pub shutdown_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            away_timeout_ms: 300_000,
            shutdown_timeout_ms: 900_000,
        }
    }
}

impl SessionConfig {
    pub fn away_timeout(&self) -> Duration {
        Duration::from_millis(self.away_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub timeout_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl CommandConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_unit_ms: policy.backoff_unit.as_millis() as u64,
        }
    }
}

impl TransactionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_unit: Duration::from_millis(self.backoff_unit_ms),
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.session.history_capacity == 0 {
            return Err(anyhow!("session.history_capacity must be at least 1"));
        }
        if self.commands.timeout_ms == 0 {
            return Err(anyhow!("commands.timeout_ms must be greater than 0"));
        }
        if self.transactions.max_attempts == 0 {
            return Err(anyhow!("transactions.max_attempts must be at least 1"));
        }
        if self.server.start_room.trim().is_empty() {
            return Err(anyhow!("server.start_room must not be empty"));
        }
        Ok(())
    }
}
