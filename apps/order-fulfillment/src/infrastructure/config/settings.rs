//! Service Configuration Settings
//!
//! Configuration types for the fulfillment service, loaded from environment
//! variables. Parsing goes through a lookup function so tests can supply
//! variables without touching the process environment.

use std::time::Duration;

use crate::application::services::FulfillmentLoopConfig;
use crate::infrastructure::host::{RconConfig, ReconnectConfig};
use crate::infrastructure::store::StoreClientConfig;

/// Recommended poll interval bounds, in seconds.
pub const RECOMMENDED_POLL_SECS: std::ops::RangeInclusive<u64> = 10..=20;

// =============================================================================
// Host Mode
// =============================================================================

/// Which command host the service drives.
///
/// There is no default: a dry run acknowledges orders without running them,
/// so the operator has to pick it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Log commands without running them.
    DryRun,
    /// Run commands over RCON.
    Rcon,
}

impl HostMode {
    /// Parse a mode name, ignoring case.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rcon" => Some(Self::Rcon),
            "dry-run" | "dry_run" | "dryrun" => Some(Self::DryRun),
            _ => None,
        }
    }

    /// Mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::Rcon => "rcon",
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Store API key.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Wrap an API key.
    #[must_use]
    pub const fn new(api_key: String) -> Self {
        Self { api_key }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Order store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Base URL of the store.
    pub url: String,
    /// Credentials for both reads and writes.
    pub credentials: Credentials,
    /// Orders table name.
    pub table: String,
    /// Per-request timeout.
    pub http_timeout: Duration,
}

impl StoreSettings {
    /// Build the store client config.
    #[must_use]
    pub fn client_config(&self) -> StoreClientConfig {
        StoreClientConfig {
            base_url: self.url.clone(),
            api_key: self.credentials.api_key().to_string(),
            table: self.table.clone(),
            timeout: self.http_timeout,
        }
    }
}

/// Command host settings.
#[derive(Clone)]
pub struct HostSettings {
    /// Selected host.
    pub mode: HostMode,
    /// RCON `host:port`.
    pub rcon_address: String,
    /// RCON password, required in [`HostMode::Rcon`].
    pub rcon_password: Option<String>,
    /// RCON socket timeout.
    pub rcon_timeout: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            mode: HostMode::DryRun,
            rcon_address: "127.0.0.1:25575".to_string(),
            rcon_password: None,
            rcon_timeout: Duration::from_secs(5),
        }
    }
}

impl HostSettings {
    /// Build the RCON config, if a password is set.
    #[must_use]
    pub fn rcon_config(&self) -> Option<RconConfig> {
        self.rcon_password.as_ref().map(|password| RconConfig {
            address: self.rcon_address.clone(),
            password: password.clone(),
            io_timeout: self.rcon_timeout,
            reconnect: ReconnectConfig::default(),
        })
    }
}

impl std::fmt::Debug for HostSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSettings")
            .field("mode", &self.mode)
            .field("rcon_address", &self.rcon_address)
            .field(
                "rcon_password",
                &self.rcon_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("rcon_timeout", &self.rcon_timeout)
            .finish()
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// Order store settings.
    pub store: StoreSettings,
    /// Time between poll cycles.
    pub poll_interval: Duration,
    /// Command host settings.
    pub host: HostSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl FulfillmentConfig {
    /// Default poll interval in seconds.
    pub const DEFAULT_POLL_SECS: u64 = 15;
    /// Default store request timeout in seconds.
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
    /// Default orders table.
    pub const DEFAULT_TABLE: &'static str = "orders";

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, empty, still a
    /// placeholder, or not parsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, "STORE_URL")?;
        let api_key = required(&lookup, "STORE_API_KEY")?;

        if url.contains("your-project") {
            return Err(ConfigError::Placeholder("STORE_URL".to_string()));
        }
        if api_key.contains("your-anon-key") {
            return Err(ConfigError::Placeholder("STORE_API_KEY".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "STORE_URL".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let poll_secs = parse_u64(&lookup, "POLL_INTERVAL_SECS", Self::DEFAULT_POLL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_SECS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let timeout_secs = parse_u64(
            &lookup,
            "STORE_HTTP_TIMEOUT_SECS",
            Self::DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "STORE_HTTP_TIMEOUT_SECS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let store = StoreSettings {
            url: url.trim_end_matches('/').to_string(),
            credentials: Credentials::new(api_key),
            table: optional(&lookup, "STORE_ORDERS_TABLE")
                .unwrap_or_else(|| Self::DEFAULT_TABLE.to_string()),
            http_timeout: Duration::from_secs(timeout_secs),
        };

        let raw_mode = required(&lookup, "HOST_MODE")?;
        let mode = HostMode::from_str_case_insensitive(&raw_mode).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "HOST_MODE".to_string(),
                reason: format!("unknown mode {raw_mode:?}, expected rcon or dry-run"),
            }
        })?;
        let rcon_password = optional(&lookup, "RCON_PASSWORD");
        if mode == HostMode::Rcon && rcon_password.is_none() {
            return Err(ConfigError::MissingEnvVar("RCON_PASSWORD".to_string()));
        }

        let host = HostSettings {
            mode,
            rcon_address: optional(&lookup, "RCON_ADDRESS")
                .unwrap_or_else(|| HostSettings::default().rcon_address),
            rcon_password,
            rcon_timeout: HostSettings::default().rcon_timeout,
        };

        let server = ServerSettings {
            health_port: parse_u16(&lookup, "HEALTH_PORT", ServerSettings::default().health_port)?,
        };

        Ok(Self {
            store,
            poll_interval: Duration::from_secs(poll_secs),
            host,
            server,
        })
    }

    /// Accepted settings that are outside recommended bounds.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let poll_secs = self.poll_interval.as_secs();
        if !RECOMMENDED_POLL_SECS.contains(&poll_secs) {
            warnings.push(format!(
                "poll interval of {poll_secs}s is outside the recommended {}-{}s",
                RECOMMENDED_POLL_SECS.start(),
                RECOMMENDED_POLL_SECS.end()
            ));
        }
        if self.store.url.starts_with("http://") {
            warnings.push("store URL is not using TLS".to_string());
        }
        warnings
    }

    /// Poll loop settings.
    #[must_use]
    pub const fn loop_config(&self) -> FulfillmentLoopConfig {
        FulfillmentLoopConfig {
            poll_interval: self.poll_interval,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable still holds a template placeholder.
    #[error("environment variable {0} still holds a placeholder value")]
    Placeholder(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

// =============================================================================
// Parsing Helpers
// =============================================================================

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value.to_string())
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).map_or(Ok(default), |raw| {
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{raw:?} is not a whole number"),
        })
    })
}

fn parse_u16<F>(lookup: &F, key: &str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).map_or(Ok(default), |raw| {
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{raw:?} is not a port number"),
        })
    })
}
