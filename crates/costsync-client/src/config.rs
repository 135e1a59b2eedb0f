//! Configuration loading and typed config structures for the CostSync store.
//!
//! The canonical configuration lives in `costsync-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure and provides a loader that reads the file, applies
//! defaults, and honors environment overrides for broker connectivity.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Minimum keep-alive the transport accepts; shorter intervals are clamped.
pub const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level store configuration.
///
/// Mirrors the structure of `costsync-config.yaml`. All fields have
/// defaults so an empty file (or no file at all) yields a working local
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Broker connection options.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Fixed topic list subscribed in one bulk call after connect.
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<String>,

    /// Outbound command tuning.
    #[serde(default)]
    pub commands: CommandConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for broker connectivity:
    /// `COSTSYNC_BROKER_HOST`, `COSTSYNC_BROKER_PORT`,
    /// `COSTSYNC_BROKER_USERNAME`, `COSTSYNC_BROKER_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.broker.apply_env_overrides();
        Ok(config)
    }

    /// The default configuration with environment overrides applied.
    ///
    /// This is the no-config-file path: a deployment configured purely
    /// through `COSTSYNC_BROKER_*` variables gets the same override pass
    /// as one that loads a file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.broker.apply_env_overrides();
        config
    }
}

/// Broker connection options.
///
/// `reconnect_period_ms` and `connect_timeout_ms` tune the transport's own
/// retry loop; the core never implements backoff logic of its own.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Whether to wrap the connection in TLS using the system trust roots.
    #[serde(default)]
    pub tls: bool,

    /// Prefix of the generated client identity; a random suffix is
    /// appended per store instantiation so concurrent sessions never
    /// collide.
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,

    /// Whether the broker should discard prior session state.
    #[serde(default = "default_true")]
    pub clean_session: bool,

    /// Heartbeat interval in seconds (clamped to [`MIN_KEEP_ALIVE_SECS`]).
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Pause between reconnect attempts after a transport failure.
    #[serde(default = "default_reconnect_period_ms")]
    pub reconnect_period_ms: u64,

    /// Upper bound on one connection attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Delay between the broker reporting connected and the bulk
    /// subscribe.
    ///
    /// Workaround for a transport race where the broker acknowledges the
    /// connection before it accepts subscription requests. A fixed delay is
    /// not a guarantee under load; treat this as a risk knob, not a fix.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl BrokerConfig {
    /// Override broker connectivity with environment variables when set.
    ///
    /// This lets deployments point at a different broker without touching
    /// the YAML config file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup.
    ///
    /// Separated from the environment so the override logic is testable
    /// without mutating process state.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(val) = get("COSTSYNC_BROKER_HOST") {
            self.host = val;
        }
        if let Some(val) = get("COSTSYNC_BROKER_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
        if let Some(val) = get("COSTSYNC_BROKER_USERNAME") {
            self.username = Some(val);
        }
        if let Some(val) = get("COSTSYNC_BROKER_PASSWORD") {
            self.password = Some(val);
        }
        if let Some(val) = get("COSTSYNC_BROKER_TLS") {
            if let Ok(tls) = val.parse() {
                self.tls = tls;
            }
        }
    }

    /// Keep-alive as a [`Duration`], clamped to the transport minimum.
    pub const fn keep_alive(&self) -> Duration {
        let secs = if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            MIN_KEEP_ALIVE_SECS
        } else {
            self.keep_alive_secs
        };
        Duration::from_secs(secs)
    }

    /// Reconnect pause as a [`Duration`].
    pub const fn reconnect_period(&self) -> Duration {
        Duration::from_millis(self.reconnect_period_ms)
    }

    /// Connection attempt bound as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Post-connect settle delay as a [`Duration`].
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            tls: false,
            client_id_prefix: default_client_id_prefix(),
            clean_session: true,
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_period_ms: default_reconnect_period_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Outbound command tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandConfig {
    /// How long a tracked command may await confirmation before it is
    /// swept out as unconfirmed.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,
}

impl CommandConfig {
    /// Pending-command TTL as a [`chrono::Duration`].
    pub fn pending_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.pending_ttl_secs).unwrap_or(i64::MAX))
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: default_pending_ttl_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "localhost".to_owned()
}

const fn default_port() -> u16 {
    1883
}

fn default_client_id_prefix() -> String {
    "costsync".to_owned()
}

const fn default_keep_alive_secs() -> u64 {
    30
}

const fn default_reconnect_period_ms() -> u64 {
    2_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_settle_delay_ms() -> u64 {
    200
}

fn default_subscriptions() -> Vec<String> {
    vec![
        "CostSync/State/Rate_Cards".to_owned(),
        "CostSync/State/Surcharge_Schedule".to_owned(),
        "CostSync/State/Warehouse_Directory".to_owned(),
        "CostSync/State/Job_Queue".to_owned(),
    ]
}

const fn default_pending_ttl_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
