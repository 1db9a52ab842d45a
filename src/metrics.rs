//! Metrics recorder.
//!
//! Process-wide counters and RTT histograms, one logical series per target,
//! backed by a private `prometheus` registry.
//!
//! # Concurrency
//!
//! Each target gets a [`TargetSeries`] handle holding pre-resolved child
//! metrics. Children are atomics, so probe loops for different targets never
//! contend, and the scrape path reads them without blocking writers. The
//! host-to-series map is only locked when a series is first created or looked
//! up by name.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use prometheus::core::Metric;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::BucketSet;

/// Counter of probe attempts dispatched.
pub const PROBES_SENT: &str = "probes_sent_total";
/// Counter of probe replies received before their timeout.
pub const PROBES_RECEIVED: &str = "probes_received_total";
/// Histogram of round-trip times in seconds.
pub const PROBE_RTT: &str = "probe_rtt_seconds";
/// Gauge set to 1 while a target's probe loop is running.
pub const TARGET_ACTIVE: &str = "probe_target_active";

const HOST_LABEL: &str = "host";

/// Errors raised while building or encoding metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric construction or registration failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Encoded output was not valid UTF-8.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Point-in-time view of one target's series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub host: String,
    pub sent: u64,
    pub received: u64,
    pub sample_count: u64,
    pub sample_sum: f64,
    /// `(upper_bound, cumulative_count)` pairs in ascending bound order,
    /// excluding the implicit `+Inf` bucket.
    pub buckets: Vec<(f64, u64)>,
}

impl SeriesSnapshot {
    fn zero(host: &str, bounds: &[f64]) -> Self {
        Self {
            host: host.to_string(),
            sent: 0,
            received: 0,
            sample_count: 0,
            sample_sum: 0.0,
            buckets: bounds.iter().map(|b| (*b, 0)).collect(),
        }
    }
}

/// Write handle for a single target's series.
#[derive(Clone)]
pub struct TargetSeries {
    sent: IntCounter,
    received: IntCounter,
    rtt: Histogram,
    active: IntGauge,
}

impl TargetSeries {
    /// Count one dispatched attempt.
    pub fn record_attempt(&self) {
        self.sent.inc();
    }

    /// Count one reply and observe its round-trip time.
    pub fn record_success(&self, rtt_secs: f64) {
        self.received.inc();
        self.rtt.observe(rtt_secs);
    }

    pub fn set_active(&self, active: bool) {
        self.active.set(i64::from(active));
    }

    fn snapshot(&self, host: &str) -> SeriesSnapshot {
        // received is bumped after sent, so reading it first keeps received <= sent.
        let received = self.received.get();
        let sent = self.sent.get();
        let proto = self.rtt.metric();
        let histogram = proto.get_histogram();
        SeriesSnapshot {
            host: host.to_string(),
            sent,
            received,
            sample_count: histogram.get_sample_count(),
            sample_sum: histogram.get_sample_sum(),
            buckets: histogram
                .get_bucket()
                .iter()
                .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                .collect(),
        }
    }
}

/// Thread-safe aggregation and exposition of probe outcomes.
pub struct MetricsRecorder {
    registry: Registry,
    sent: IntCounterVec,
    received: IntCounterVec,
    rtt: HistogramVec,
    active: IntGaugeVec,
    buckets: BucketSet,
    series: RwLock<HashMap<String, TargetSeries>>,
}

impl MetricsRecorder {
    /// Create a recorder whose histograms all use `buckets`.
    ///
    /// # Errors
    /// Returns `MetricsError::Prometheus` if a metric cannot be registered.
    pub fn new(buckets: &BucketSet) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sent = IntCounterVec::new(
            Opts::new(PROBES_SENT, "Number of ICMP echo requests sent."),
            &[HOST_LABEL],
        )?;
        let received = IntCounterVec::new(
            Opts::new(PROBES_RECEIVED, "Number of ICMP echo replies received in time."),
            &[HOST_LABEL],
        )?;
        let rtt = HistogramVec::new(
            HistogramOpts::new(PROBE_RTT, "ICMP echo round-trip time in seconds.")
                .buckets(buckets.bounds().to_vec()),
            &[HOST_LABEL],
        )?;
        let active = IntGaugeVec::new(
            Opts::new(TARGET_ACTIVE, "Whether the probe loop for a target is running."),
            &[HOST_LABEL],
        )?;

        registry.register(Box::new(sent.clone()))?;
        registry.register(Box::new(received.clone()))?;
        registry.register(Box::new(rtt.clone()))?;
        registry.register(Box::new(active.clone()))?;

        Ok(Self {
            registry,
            sent,
            received,
            rtt,
            active,
            buckets: buckets.clone(),
            series: RwLock::new(HashMap::new()),
        })
    }

    /// Boundaries shared by every target's histogram.
    pub fn buckets(&self) -> &BucketSet {
        &self.buckets
    }

    /// Get the series handle for `host`, creating a zero-valued one on first use.
    pub fn series(&self, host: &str) -> TargetSeries {
        if let Some(series) = self
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
        {
            return series.clone();
        }

        let mut map = self.series.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(host.to_string())
            .or_insert_with(|| TargetSeries {
                sent: self.sent.with_label_values(&[host]),
                received: self.received.with_label_values(&[host]),
                rtt: self.rtt.with_label_values(&[host]),
                active: self.active.with_label_values(&[host]),
            })
            .clone()
    }

    /// Increment the sent counter for `host`.
    pub fn record_attempt(&self, host: &str) {
        self.series(host).record_attempt();
    }

    /// Increment the received counter for `host` and observe `rtt_secs`.
    pub fn record_success(&self, host: &str, rtt_secs: f64) {
        self.series(host).record_success(rtt_secs);
    }

    /// Set the active gauge for `host`.
    pub fn set_active(&self, host: &str, active: bool) {
        self.series(host).set_active(active);
    }

    /// Snapshot of every known series, ordered by host.
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let map = self.series.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<_> = map
            .iter()
            .map(|(host, series)| series.snapshot(host))
            .collect();
        snapshots.sort_by(|a, b| a.host.cmp(&b.host));
        snapshots
    }

    /// Snapshot of a single series. Unknown hosts yield a zero-valued series
    /// without creating one.
    pub fn snapshot_for(&self, host: &str) -> SeriesSnapshot {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .map(|series| series.snapshot(host))
            .unwrap_or_else(|| SeriesSnapshot::zero(host, self.buckets.bounds()))
    }

    /// Render all series in the Prometheus text exposition format.
    ///
    /// # Errors
    /// Returns `MetricsError` if encoding fails.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("buckets", &self.buckets)
            .field(
                "series_count",
                &self.series.try_read().map(|s| s.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}
