//! Server configuration module
//!
//! Provides the configuration types for the chat server. Values are layered
//! in increasing precedence: built-in defaults, an optional TOML file named by
//! `SOCIALCHAT_CONFIG`, then individual environment variables.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_FILE_ENV: &str = "SOCIALCHAT_CONFIG";

const DEFAULT_JWT_SECRET: &str = "development-secret-change-me";

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// sqlx connection string for the message store
    pub database_url: String,
    /// Origins allowed to open chat sockets (and make CORS requests)
    pub allowed_origins: Vec<String>,
    /// HS256 secret for session tokens
    pub jwt_secret: String,
    /// Per-peer write timeout during fan-out, 0 disables
    pub write_timeout_ms: u64,
    /// Close sessions that stay silent this long, 0 disables
    pub idle_timeout_secs: u64,
    /// Broadcast messages whose persistence failed
    pub broadcast_unpersisted: bool,
    /// Fan out messages sent through the REST endpoint as well
    pub rest_fanout: bool,
    /// How long the dispatcher may keep draining after shutdown starts
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "sqlite://socialchat.db?mode=rwc".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            write_timeout_ms: 10_000,
            idle_timeout_secs: 0,
            broadcast_unpersisted: true,
            rest_fanout: false,
            shutdown_grace_secs: 5,
        }
    }
}

/// Optional overrides read from a TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    database_url: Option<String>,
    allowed_origins: Option<Vec<String>>,
    jwt_secret: Option<String>,
    write_timeout_ms: Option<u64>,
    idle_timeout_secs: Option<u64>,
    broadcast_unpersisted: Option<bool>,
    rest_fanout: Option<bool>,
    shutdown_grace_secs: Option<u64>,
}

impl ServerConfig {
    /// Create a new ServerConfigBuilder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup(CONFIG_FILE_ENV) {
            config.apply_file(Path::new(&path))?;
        }
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file: FileConfig = toml::from_str(&raw).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if let Some(v) = file.host {
            self.host = v;
        }
        if let Some(v) = file.port {
            self.port = v;
        }
        if let Some(v) = file.database_url {
            self.database_url = v;
        }
        if let Some(v) = file.allowed_origins {
            self.allowed_origins = v;
        }
        if let Some(v) = file.jwt_secret {
            self.jwt_secret = v;
        }
        if let Some(v) = file.write_timeout_ms {
            self.write_timeout_ms = v;
        }
        if let Some(v) = file.idle_timeout_secs {
            self.idle_timeout_secs = v;
        }
        if let Some(v) = file.broadcast_unpersisted {
            self.broadcast_unpersisted = v;
        }
        if let Some(v) = file.rest_fanout {
            self.rest_fanout = v;
        }
        if let Some(v) = file.shutdown_grace_secs {
            self.shutdown_grace_secs = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("SERVER_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("SERVER_PORT") {
            self.port = parse_value("SERVER_PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("WRITE_TIMEOUT_MS") {
            self.write_timeout_ms = parse_value("WRITE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("IDLE_TIMEOUT_SECS") {
            self.idle_timeout_secs = parse_value("IDLE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("BROADCAST_UNPERSISTED") {
            self.broadcast_unpersisted = parse_value("BROADCAST_UNPERSISTED", &v)?;
        }
        if let Some(v) = lookup("REST_FANOUT") {
            self.rest_fanout = parse_value("REST_FANOUT", &v)?;
        }
        if let Some(v) = lookup("SHUTDOWN_GRACE_SECS") {
            self.shutdown_grace_secs = parse_value("SHUTDOWN_GRACE_SECS", &v)?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingValue("host"));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("database_url"));
        }
        if self.allowed_origins.is_empty() {
            return Err(ConfigError::MissingValue("allowed_origins"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("jwt_secret"));
        }
        Ok(())
    }

    /// Whether the jwt secret is still the built-in development value
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Exact-match check of a request `Origin` against the allow-list.
    /// A missing origin is never allowed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) => self.allowed_origins.iter().any(|o| o == origin),
            None => false,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Builder for ServerConfig
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: Option<ServerConfig>,
}

impl ServerConfigBuilder {
    fn config(&mut self) -> &mut ServerConfig {
        self.config.get_or_insert_with(ServerConfig::default)
    }

    /// Set the bind host and port
    pub fn bind(mut self, host: impl Into<String>, port: u16) -> Self {
        let config = self.config();
        config.host = host.into();
        config.port = port;
        self
    }

    /// Set the database URL
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config().database_url = url.into();
        self
    }

    /// Replace the origin allow-list
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config().allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Set the token secret
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config().jwt_secret = secret.into();
        self
    }

    /// Set the per-write timeout in milliseconds (0 disables)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config().write_timeout_ms = ms;
        self
    }

    /// Set the idle timeout in seconds (0 disables)
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config().idle_timeout_secs = secs;
        self
    }

    /// Whether to broadcast messages the store failed to save
    pub fn broadcast_unpersisted(mut self, enabled: bool) -> Self {
        self.config().broadcast_unpersisted = enabled;
        self
    }

    /// Whether REST-sent messages are fanned out too
    pub fn rest_fanout(mut self, enabled: bool) -> Self {
        self.config().rest_fanout = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("cannot read config file {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("invalid config file {path}: {reason}")]
    InvalidFile { path: String, reason: String },
}
