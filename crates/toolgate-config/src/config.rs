// crates/toolgate-config/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Configuration loading and validation for the Toolgate gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, thiserror, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Remote server entries are
//! fully validated before the gateway starts: ids must be unique and must not
//! shadow the built-in `core` server, URLs must parse with an http scheme,
//! and credentials must be non-empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "toolgate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "TOOLGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Server id reserved for the built-in local server.
pub const RESERVED_SERVER_ID: &str = "core";
/// Default gateway bind address.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default session idle timeout in milliseconds.
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 300_000;
/// Default session reap interval in milliseconds.
const DEFAULT_REAP_INTERVAL_MS: u64 = 60_000;
/// Default proxy request timeout in milliseconds.
const DEFAULT_PROXY_TIMEOUT_MS: u64 = 30_000;
/// Default proxy connect timeout in milliseconds.
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
/// Default reported version for remote servers.
const DEFAULT_REMOTE_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Toolgate gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Session lifecycle configuration.
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Remote proxy configuration.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Remote server entries.
    #[serde(default)]
    pub remotes: Vec<RemoteServerConfig>,
}

impl GatewayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then the `TOOLGATE_CONFIG`
    /// environment variable, then `toolgate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.sessions.validate()?;
        self.proxy.validate()?;
        let mut seen_ids = BTreeSet::new();
        for remote in &self.remotes {
            remote.validate()?;
            if !seen_ids.insert(remote.id.trim()) {
                return Err(ConfigError::Invalid(format!("duplicate remote id: {}", remote.id)));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the gateway listener.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(
                "server.bind_addr must be a socket address".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is expired, in milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Interval between reaper sweeps, in milliseconds.
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            reap_interval_ms: default_reap_interval_ms(),
        }
    }
}

impl SessionConfig {
    /// Validates session configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sessions.idle_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.reap_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sessions.reap_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Returns the reap interval as a [`Duration`].
    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

/// Remote proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Default forward timeout in milliseconds for remotes without an
    /// explicit override.
    #[serde(default = "default_proxy_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Upstream connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_proxy_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ProxyConfig {
    /// Validates proxy configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "proxy.default_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "proxy.connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default forward timeout as a [`Duration`].
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Returns the connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Remote server entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteServerConfig {
    /// Server identifier used in routing paths.
    pub id: String,
    /// Human-readable server name.
    pub name: String,
    /// Reported server version.
    #[serde(default = "default_remote_version")]
    pub version: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Upstream URL requests are forwarded to.
    pub url: String,
    /// Static headers attached to every forwarded request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional upstream authentication.
    #[serde(default)]
    pub auth: Option<RemoteAuthConfig>,
    /// Optional per-server forward timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Allow insecure HTTP upstream URLs.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl RemoteServerConfig {
    /// Validates a remote server entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Invalid("remotes.id must be non-empty".to_string()));
        }
        if self.id.trim() == RESERVED_SERVER_ID {
            return Err(ConfigError::Invalid(
                "remote id core is reserved for the built-in server".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("remotes.name must be non-empty".to_string()));
        }
        let url = Url::parse(&self.url)
            .map_err(|err| ConfigError::Invalid(format!("remotes.url is not a valid url: {err}")))?;
        match url.scheme() {
            "https" => {}
            "http" => {
                if !self.allow_insecure_http {
                    return Err(ConfigError::Invalid(
                        "insecure http requires allow_insecure_http".to_string(),
                    ));
                }
            }
            _ => {
                return Err(ConfigError::Invalid(
                    "remotes.url must use http or https".to_string(),
                ));
            }
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "remotes.timeout_ms must be greater than zero".to_string(),
            ));
        }
        for key in self.headers.keys() {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "remotes.headers keys must be non-empty".to_string(),
                ));
            }
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }

    /// Returns the effective forward timeout, falling back to `default`.
    #[must_use]
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map_or(default, Duration::from_millis)
    }
}

/// Upstream authentication configuration for a remote server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteAuthConfig {
    /// Bearer token authentication.
    Bearer {
        /// Token placed in the `Authorization: Bearer` header.
        token: String,
    },
    /// HTTP basic authentication.
    Basic {
        /// Basic auth username.
        username: String,
        /// Basic auth password.
        password: String,
    },
}

impl RemoteAuthConfig {
    /// Validates upstream authentication configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Bearer {
                token,
            } => {
                if token.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "remotes.auth.token must be non-empty".to_string(),
                    ));
                }
                if token.chars().any(char::is_whitespace) {
                    return Err(ConfigError::Invalid(
                        "remotes.auth.token must not contain whitespace".to_string(),
                    ));
                }
            }
            Self::Basic {
                username,
                password,
            } => {
                if username.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "remotes.auth.username must be non-empty".to_string(),
                    ));
                }
                if username.contains(':') {
                    return Err(ConfigError::Invalid(
                        "remotes.auth.username must not contain a colon".to_string(),
                    ));
                }
                if password.is_empty() {
                    return Err(ConfigError::Invalid(
                        "remotes.auth.password must be non-empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default gateway bind address.
fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

/// Default maximum request body size in bytes.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default session idle timeout in milliseconds.
const fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}

/// Default session reap interval in milliseconds.
const fn default_reap_interval_ms() -> u64 {
    DEFAULT_REAP_INTERVAL_MS
}

/// Default proxy request timeout in milliseconds.
const fn default_proxy_timeout_ms() -> u64 {
    DEFAULT_PROXY_TIMEOUT_MS
}

/// Default proxy connect timeout in milliseconds.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default reported version for remote servers.
fn default_remote_version() -> String {
    DEFAULT_REMOTE_VERSION.to_string()
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
