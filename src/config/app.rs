//! Application configuration structures.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::buckets::{BucketSet, DEFAULT_BUCKETS};
use super::validation::{ConfigError, expand_env_vars, parse_listen_address};

// =============================================================================
// Constants
// =============================================================================

/// Default scrape listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9374";

/// Default metrics path.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Fixed routes served next to the telemetry path.
pub const RESERVED_PATHS: &[&str] = &["/healthz", "/api/targets"];

/// Default pause between probe attempts (1 second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-attempt timeout (1 second).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default watchdog check period (45 seconds).
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(45);

/// Default stuck threshold (120 seconds).
pub const DEFAULT_STUCK_THRESHOLD: Duration = Duration::from_secs(120);

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_telemetry_path() -> String {
    DEFAULT_TELEMETRY_PATH.to_string()
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_buckets() -> String {
    DEFAULT_BUCKETS.to_string()
}

fn default_privileged() -> bool {
    true
}

fn default_check_period() -> Duration {
    DEFAULT_CHECK_PERIOD
}

fn default_stuck_threshold() -> Duration {
    DEFAULT_STUCK_THRESHOLD
}

// =============================================================================
// Web Configuration
// =============================================================================

/// Scrape endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address (default: ":9374").
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Path under which metrics are exposed (default: "/metrics").
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
        }
    }
}

// =============================================================================
// Probe Configuration
// =============================================================================

/// Per-target probe loop settings, shared by every target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Pause between attempts (default: 1s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Per-attempt reply timeout (default: 1s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Use raw ICMP sockets (default: true).
    #[serde(default = "default_privileged")]
    pub privileged: bool,

    /// Comma-delimited histogram boundaries in seconds.
    #[serde(default = "default_buckets")]
    pub buckets: String,

    /// Keep retrying session setup on the fixed interval instead of
    /// retiring the target (default: false).
    #[serde(default)]
    pub retry_session: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            privileged: true,
            buckets: default_buckets(),
            retry_session: false,
        }
    }
}

// =============================================================================
// Watchdog Configuration
// =============================================================================

/// Stuck-loop detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// How often every target is inspected (default: 45s).
    #[serde(default = "default_check_period", with = "humantime_serde")]
    pub check_period: Duration,

    /// Age of the last attempt start past which a loop counts as stuck
    /// (default: 120s).
    #[serde(default = "default_stuck_threshold", with = "humantime_serde")]
    pub stuck_threshold: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_period: DEFAULT_CHECK_PERIOD,
            stuck_threshold: DEFAULT_STUCK_THRESHOLD,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target hosts (hostnames or IP addresses).
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Scrape endpoint configuration.
    #[serde(default)]
    pub web: WebConfig,

    /// Probe loop configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Watchdog configuration.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&expand_env_vars(&content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid, or
    /// `ConfigError::InvalidBuckets` if the bucket list does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_listen_address(&self.web.listen_address)?;

        let path = &self.web.telemetry_path;
        if !path.starts_with('/') || path == "/" {
            return Err(ConfigError::ValidationError(format!(
                "telemetry path must start with '/' and not be the root: '{}'",
                path
            )));
        }
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "telemetry path '{}' is already served by another route",
                path
            )));
        }
        if path.contains(['{', '}', '*']) {
            return Err(ConfigError::ValidationError(format!(
                "telemetry path must be a literal path without '{{', '}}' or '*': '{}'",
                path
            )));
        }

        if self.probe.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "probe interval must be positive".to_string(),
            ));
        }

        if self.probe.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "probe timeout must be positive".to_string(),
            ));
        }

        if self.watchdog.check_period.is_zero() {
            return Err(ConfigError::ValidationError(
                "watchdog check_period must be positive".to_string(),
            ));
        }

        // A healthy cycle takes at most interval + timeout.
        let cycle = self.probe.interval + self.probe.timeout;
        if self.watchdog.stuck_threshold <= cycle {
            return Err(ConfigError::ValidationError(format!(
                "watchdog stuck_threshold ({:?}) must exceed probe interval + timeout ({:?})",
                self.watchdog.stuck_threshold, cycle
            )));
        }

        BucketSet::parse(&self.probe.buckets)?;

        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if host.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "target host must not be empty".to_string(),
                ));
            }
            if !seen.insert(host.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate target host: '{}'",
                    host
                )));
            }
        }

        Ok(())
    }

    /// Resolved listen socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.web.listen_address)
    }

    /// Parsed histogram boundaries.
    pub fn bucket_set(&self) -> Result<BucketSet, ConfigError> {
        BucketSet::parse(&self.probe.buckets)
    }
}
