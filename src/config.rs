//! Engine configuration
//!
//! Read from a TOML file (default `scoreboard.toml`). Every section is
//! optional; a missing file means all defaults.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9300
//!
//! [auth]
//! cookie_name = "access_token"
//! session_ttl_minutes = 480
//!
//! [[auth.sessions]]
//! token = "mesa-1"
//! username = "juez1"
//! roles = ["judge"]
//!
//! [storage]
//! roster_file = "roster.json"
//! scores_file = "scores.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoringError};
use crate::session::{CurrentUser, Role, SessionRegistry, UserSession};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "scoreboard.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Events a slow viewer may fall behind before it is resynced
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9300
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Cookie carrying the session token on the handshake
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: i64,

    /// Pre-shared sessions registered at startup
    #[serde(default)]
    pub sessions: Vec<SeededSession>,
}

fn default_cookie_name() -> String {
    "access_token".to_string()
}

fn default_session_ttl() -> i64 {
    60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_ttl_minutes: default_session_ttl(),
            sessions: Vec::new(),
        }
    }
}

/// A session issued out of band (e.g. printed for a judge's tablet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeededSession {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Bound on each persistence call
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
}

fn default_persist_timeout_ms() -> u64 {
    5_000
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            persist_timeout_ms: default_persist_timeout_ms(),
        }
    }
}

impl SubmissionConfig {
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON roster export; empty roster when unset
    #[serde(default)]
    pub roster_file: Option<PathBuf>,

    /// JSON score file; scores kept in memory when unset
    #[serde(default)]
    pub scores_file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| ScoringError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| ScoringError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !["error", "warn", "info", "debug", "trace"].contains(&self.logging.level.as_str()) {
            return Err(ScoringError::Config {
                message: format!(
                    "Invalid log level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level
                ),
            });
        }
        if self.auth.cookie_name.trim().is_empty() {
            return Err(ScoringError::Config {
                message: "auth.cookie_name must not be empty".to_string(),
            });
        }
        if self.auth.session_ttl_minutes <= 0 {
            return Err(ScoringError::Config {
                message: "auth.session_ttl_minutes must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Session registry with the configured TTL and seeded sessions
    pub fn session_registry(&self) -> SessionRegistry {
        let ttl = chrono::Duration::minutes(self.auth.session_ttl_minutes);
        let registry = SessionRegistry::new(ttl);
        for seeded in &self.auth.sessions {
            registry.insert(UserSession {
                token: seeded.token.clone(),
                user: CurrentUser {
                    id: seeded.user_id,
                    username: seeded.username.clone(),
                    roles: seeded.roles.clone(),
                },
                expires_at: Utc::now() + ttl,
            });
        }
        registry
    }

    /// `tracing` filter directive for the configured level
    pub fn log_directive(&self) -> String {
        format!("scoreboard_engine={}", self.logging.level)
    }
}
