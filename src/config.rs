//! Configuration module.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Scrape endpoint settings (listen address, metrics path)
//! - Probe loop settings (interval, timeout, privileged mode, histogram buckets)
//! - Watchdog settings (check period, stuck threshold)
//!
//! Command-line flags override values loaded from a file.

mod app;
mod buckets;
mod validation;

pub use app::{AppConfig, ProbeConfig, WatchdogConfig, WebConfig};
pub use buckets::{BucketSet, DEFAULT_BUCKETS};
pub use validation::{ConfigError, expand_env_vars, parse_duration, parse_listen_address};

// Re-export constants
pub use app::{
    DEFAULT_CHECK_PERIOD, DEFAULT_INTERVAL, DEFAULT_LISTEN_ADDRESS, DEFAULT_STUCK_THRESHOLD,
    DEFAULT_TELEMETRY_PATH, DEFAULT_TIMEOUT, RESERVED_PATHS,
};
