//! Configuration loading and types for PodGate.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, token verification, the credential store,
//! per-tenant rate limiting, CORS, and logging.

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use governor::Quota;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer-token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Credential store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-tenant rate limit settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            store: StoreConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Bearer-token verification configuration.
///
/// Tokens are self-describing (the issuer claim carries the signer's
/// public key), so no central key material is configured here — only
/// how strictly the validity window is enforced.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Allowed clock skew, in seconds, when checking token expiry.
    #[serde(default)]
    pub expiry_leeway: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { expiry_leeway: 0 }
    }
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file holding tenant credential records.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Per-tenant rate limit configuration.
///
/// Requests are keyed by the verified token issuer, so one tenant
/// hammering the gateway does not consume another tenant's budget.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Maximum requests per window per tenant.
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl RateLimitConfig {
    /// Translate the configured limit into a `governor` quota.
    ///
    /// Returns `None` when disabled or when the settings describe no
    /// usable limit (zero requests or a zero-length window).
    pub fn quota(&self) -> Option<Quota> {
        if !self.enabled || self.request_limit == 0 || self.window_seconds == 0 {
            return None;
        }
        let burst = NonZeroU32::new(self.request_limit)?;
        let period = Duration::from_secs(self.window_seconds) / self.request_limit;
        Quota::with_period(period).map(|q| q.allow_burst(burst))
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CorsConfig {
    /// Whether to attach a CORS layer.
    #[serde(default)]
    pub enabled: bool,

    /// Allowed origins (empty = any).
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Allowed methods (empty = any).
    #[serde(default)]
    pub allowed_methods: Vec<String>,

    /// Allowed headers (empty = any).
    #[serde(default)]
    pub allowed_headers: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    8
}

fn default_store_path() -> String {
    "./data/credentials.db".to_string()
}

fn default_request_limit() -> u32 {
    100
}

fn default_window_seconds() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

// -- Tests -------------------------------------------------------------------
