//! Configuration types for rdstail.
//!
//! [`Config::load`] layers, lowest precedence first: the embedded defaults,
//! `~/.config/rdstail/config.toml` (or an explicit path), and `RDSTAIL_*`
//! environment variables (`RDSTAIL_POLL__RATE=10s`). Command-line flags are
//! applied on top by the binary. [`Config::defaults`] returns the embedded
//! defaults without touching the filesystem or environment (useful in tests).

use crate::error::ConfigError;
use crate::syslog::{Facility, Severity};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[source]
endpoint        = "http://127.0.0.1:8080"
max_retries     = 10
request_timeout = "30s"
page_lines      = 0

[poll]
rate               = "3s"
prefix             = ""
backfill_lines     = 0
from_start         = false
max_pages_per_tick = 64

[collector]
app_name        = "rdstail"
facility        = "user"
severity        = "info"
max_retries     = 3
retry_backoff   = "500ms"
connect_timeout = "10s"
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database instance identifier. Required by every mode.
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

/// `[source]`: the remote log API client.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Retry budget for a single request before it surfaces as unavailable.
    #[serde(default = "default_source_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout", deserialize_with = "de_duration")]
    pub request_timeout: Duration,
    /// Lines requested per page; 0 leaves the page size to the API.
    #[serde(default)]
    pub page_lines: u64,
}

fn default_endpoint() -> String { "http://127.0.0.1:8080".to_string() }
fn default_source_max_retries() -> u32 { 10 }
fn default_request_timeout() -> Duration { Duration::from_secs(30) }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_retries: default_source_max_retries(),
            request_timeout: default_request_timeout(),
            page_lines: 0,
        }
    }
}

/// `[poll]`: continuous follow modes.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_rate", deserialize_with = "de_duration")]
    pub rate: Duration,
    /// Regex matching the first line of a new entry. Empty: every line.
    #[serde(default)]
    pub prefix: String,
    /// Lines of existing content shown on first contact.
    #[serde(default)]
    pub backfill_lines: u64,
    /// Read the current file from byte 0 on first contact instead.
    #[serde(default)]
    pub from_start: bool,
    #[serde(default = "default_max_pages_per_tick")]
    pub max_pages_per_tick: u32,
}

fn default_rate() -> Duration { Duration::from_secs(3) }
fn default_max_pages_per_tick() -> u32 { 64 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            prefix: String::new(),
            backfill_lines: 0,
            from_start: false,
            max_pages_per_tick: default_max_pages_per_tick(),
        }
    }
}

/// `[collector]`: the remote syslog collector used by forward mode.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// `host:port` of the collector.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Overrides the hostname resolved from the OS at startup.
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_facility")]
    pub facility: Facility,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Reconnect-and-retry cycles before a write failure is fatal.
    #[serde(default = "default_collector_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff", deserialize_with = "de_duration")]
    pub retry_backoff: Duration,
    #[serde(default = "default_connect_timeout", deserialize_with = "de_duration")]
    pub connect_timeout: Duration,
}

fn default_app_name() -> String { "rdstail".to_string() }
fn default_facility() -> Facility { Facility::User }
fn default_severity() -> Severity { Severity::Info }
fn default_collector_max_retries() -> u32 { 3 }
fn default_retry_backoff() -> Duration { Duration::from_millis(500) }
fn default_connect_timeout() -> Duration { Duration::from_secs(10) }

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            address: None,
            app_name: default_app_name(),
            hostname: None,
            facility: default_facility(),
            severity: default_severity(),
            max_retries: default_collector_max_retries(),
            retry_backoff: default_retry_backoff(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the layered configuration. An explicit `path` must exist; the
    /// default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(config_path().as_path()).required(false),
        };

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("RDSTAIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// The instance identifier, or [`ConfigError::MissingInstance`].
    pub fn instance(&self) -> Result<&str, ConfigError> {
        match self.instance.as_deref().map(str::trim) {
            Some(instance) if !instance.is_empty() => Ok(instance),
            _ => Err(ConfigError::MissingInstance),
        }
    }

    /// The collector address, or [`ConfigError::MissingCollector`].
    pub fn collector_address(&self) -> Result<&str, ConfigError> {
        match self.collector.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => Ok(address),
            _ => Err(ConfigError::MissingCollector),
        }
    }

    /// Checks shared by the continuous modes.
    pub fn validate_poll(&self) -> Result<(), ConfigError> {
        self.instance()?;
        if self.poll.rate.is_zero() {
            return Err(ConfigError::ZeroRate);
        }
        Ok(())
    }
}

/// Parse a humantime duration such as `3s`, `500ms` or `1m 30s`.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s.trim()).map_err(|_| ConfigError::InvalidDuration(s.to_string()))
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("rdstail")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
