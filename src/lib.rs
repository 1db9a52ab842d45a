//! Smokeping Exporter
//!
//! Continuously measures ICMP reachability and round-trip latency to a fixed
//! set of hosts and exposes the results for Prometheus to scrape.
//!
//! # Architecture
//!
//! - **Config**: CLI flags and optional YAML file, histogram bucket parsing
//! - **Metrics**: per-target sent/received counters and RTT histograms
//! - **Prober**: transport seam with an ICMP implementation
//! - **Probe**: one self-scheduling probe loop per target
//! - **Watchdog**: crash-only detection of hung probe loops
//! - **Server**: scrape endpoint, landing page, and target status API

pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod prober;
pub mod server;
pub mod watchdog;

pub use config::{AppConfig, BucketSet, ConfigError, ProbeConfig, WatchdogConfig, WebConfig};
pub use error::ExporterError;
pub use metrics::{MetricsError, MetricsRecorder, SeriesSnapshot, TargetSeries};
pub use probe::{
    CycleOutcome, ProbeLoop, ProbeSettings, ProbeState, TargetRecord, TargetRegistry, TargetStatus,
};
pub use prober::{
    EchoReply, IcmpProber, ProbeOptions, ProbeOutcome, ProbeSession, Prober, ProberError,
};
pub use watchdog::{STUCK_EXIT_CODE, StuckTarget, Watchdog};
