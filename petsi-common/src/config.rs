//! Configuration types for the PETSI gateway.
//!
//! Configuration is read from `~/.petsi/config.json` (or the file named by
//! `PETSI_CONFIG`), with every field defaulted so a missing file is valid.
//! Environment variables are applied on top by [`Config::load_with_env`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "PETSI_CONFIG";

/// Default upstream webhook base URL.
pub const DEFAULT_UPSTREAM_URL: &str = "https://n8n.petsi-dsi.website/webhook";

/// Get the configuration directory (~/.petsi).
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".petsi"),
            |dirs| dirs.home_dir().join(".petsi"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are ignored and leave the current value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PETSI_GATEWAY_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("PETSI_GATEWAY_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(url) = lookup("N8N_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(minutes) =
            lookup("ACCESS_TOKEN_EXPIRE_MINUTES").and_then(|m| m.parse().ok())
        {
            self.auth.access_token_expire_minutes = minutes;
        }
        if let Some(level) = lookup("PETSI_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("PETSI_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Socket address string the gateway binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means any origin (without credentials).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

// ============================================================================
// Upstream
// ============================================================================

/// Upstream webhook service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL every endpoint path is appended to
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// Timeout for quick lookups and CRUD calls
    #[serde(default = "default_short_timeout")]
    pub short_timeout_secs: u64,

    /// Timeout for listing and download-link calls
    #[serde(default = "default_standard_timeout")]
    pub standard_timeout_secs: u64,

    /// Timeout for uploads and the web chatbot
    #[serde(default = "default_long_timeout")]
    pub long_timeout_secs: u64,

    /// Largest accepted upload, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            short_timeout_secs: default_short_timeout(),
            standard_timeout_secs: default_standard_timeout(),
            long_timeout_secs: default_long_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Chatbot session cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime after the latest chatbot interaction
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Name of the cookie carrying the session id
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Login and token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Falls back to a demo key when unset.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in minutes
    #[serde(default = "default_token_minutes")]
    pub access_token_expire_minutes: u64,

    /// Accounts allowed to log in. Empty seeds the demo accounts.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl AuthConfig {
    /// Signing secret, with the demo fallback applied.
    pub fn secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or(DEFAULT_JWT_SECRET)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_expire_minutes: default_token_minutes(),
            users: Vec::new(),
        }
    }
}

/// Fallback JWT secret for local development.
pub const DEFAULT_JWT_SECRET: &str = "secret-demo-key";

/// A configured login account.
///
/// Exactly one of `password` or `password_hash` should be set; a plain
/// password is hashed when the gateway starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: u64,
    pub username: String,
    pub full_name: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

// ============================================================================
// Observability
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.into()
}
fn default_short_timeout() -> u64 {
    5
}
fn default_standard_timeout() -> u64 {
    10
}
fn default_long_timeout() -> u64 {
    30
}
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}
fn default_session_ttl() -> u64 {
    30 * 60
}
fn default_cookie_name() -> String {
    "id_session".into()
}
fn default_token_minutes() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
