//! Service configuration.
//!
//! Loaded from a TOML file (path from the first CLI argument or
//! `MENTORLINK_CONFIG`), then `DATABASE_URL` and `MENTORLINK_BIND` from the
//! environment (or `.env`) override the file. Every field has a default, so
//! running without a file is fine for local work.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub matching: MatchingConfig,
    pub chat: ChatConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the file path, load it if present and apply environment
    /// overrides.
    pub fn from_env(path: Option<String>) -> Result<Self, ConfigError> {
        let path = path.or_else(|| dotenv::var("MENTORLINK_CONFIG").ok());
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new("mentorlink.toml").exists() => Self::load("mentorlink.toml")?,
            None => Self::default(),
        };

        if let Ok(url) = dotenv::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(bind) = dotenv::var("MENTORLINK_BIND") {
            config.server.bind = bind;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.matching;
        if m.cover_letter_min_len > m.cover_letter_max_len {
            return Err(ConfigError::Invalid(format!(
                "matching.cover_letter_min_len ({}) exceeds cover_letter_max_len ({})",
                m.cover_letter_min_len, m.cover_letter_max_len
            )));
        }
        if m.mentor_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "matching.mentor_capacity must be at least 1 (omit it for unlimited)".to_owned(),
            ));
        }

        let c = &self.chat;
        if c.max_message_len == 0 {
            return Err(ConfigError::Invalid("chat.max_message_len must be positive".to_owned()));
        }
        if c.history_page == 0 || c.history_page > c.max_history_page {
            return Err(ConfigError::Invalid(format!(
                "chat.history_page must be between 1 and max_history_page ({})",
                c.max_history_page
            )));
        }
        if c.outbox_len == 0 {
            return Err(ConfigError::Invalid("chat.outbox_len must be positive".to_owned()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".to_owned()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on (default: 0.0.0.0:8080).
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".to_owned() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, `sqlite://` URL or `:memory:`.
    pub url: String,
    /// Pool size. Write transactions take the SQLite write lock up front,
    /// so writers queue on the busy timeout whatever the size.
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self { url: ":memory:".to_owned(), max_connections: 1 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "mentorlink.db".to_owned(), max_connections: 1 }
    }
}

/// Rules applied by the match store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub cover_letter_min_len: usize,
    pub cover_letter_max_len: usize,
    /// Maximum concurrently active matches per alumni. `None` is unlimited.
    pub mentor_capacity: Option<u32>,
    /// Refuse a new request to an alumni who already rejected this student.
    pub block_rerequest_after_reject: bool,
    /// Mark the losing request of a concurrent approval as rejected instead
    /// of leaving it pending.
    pub auto_reject_on_conflict: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            cover_letter_min_len: 50,
            cover_letter_max_len: 5000,
            mentor_capacity: None,
            block_rerequest_after_reject: false,
            auto_reject_on_conflict: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    pub max_message_len: usize,
    /// Messages returned on join and when no limit is given.
    pub history_page: u32,
    pub max_history_page: u32,
    /// Let admins join any active match channel.
    pub admin_observers: bool,
    /// Events queued per socket before the session is dropped as too slow.
    pub outbox_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_len: 2000,
            history_page: 50,
            max_history_page: 200,
            admin_observers: true,
            outbox_len: 256,
        }
    }
}
