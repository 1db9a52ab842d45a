//! Target records and the fixed target registry.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Address information learned from probe replies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub address: Option<IpAddr>,
    pub hostname: Option<String>,
}

/// Per-target state.
///
/// The owning probe loop is the only writer of `last_attempt_started`; the
/// watchdog is the only outside reader. The timestamp is stored as
/// nanoseconds since the record's creation in an atomic, written with
/// `Release` and read with `Acquire`.
#[derive(Debug)]
pub struct TargetRecord {
    host: String,
    epoch: Instant,
    last_attempt_started_ns: AtomicU64,
    last_outcome_received: AtomicBool,
    active: AtomicBool,
    resolved: Mutex<ResolvedTarget>,
}

impl TargetRecord {
    /// Create a record whose last attempt counts as started now.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            epoch: Instant::now(),
            last_attempt_started_ns: AtomicU64::new(0),
            last_outcome_received: AtomicBool::new(false),
            active: AtomicBool::new(true),
            resolved: Mutex::new(ResolvedTarget::default()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Record that an attempt is starting now.
    pub fn mark_attempt_started(&self) {
        self.mark_attempt_started_at(Instant::now());
    }

    pub fn mark_attempt_started_at(&self, now: Instant) {
        let ns = now.saturating_duration_since(self.epoch).as_nanos();
        self.last_attempt_started_ns
            .store(u64::try_from(ns).unwrap_or(u64::MAX), Ordering::Release);
    }

    /// When the most recent attempt started.
    pub fn last_attempt_started(&self) -> Instant {
        let ns = self.last_attempt_started_ns.load(Ordering::Acquire);
        self.epoch + Duration::from_nanos(ns)
    }

    /// Time elapsed between the most recent attempt start and `now`.
    pub fn since_last_attempt(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_attempt_started())
    }

    pub fn set_outcome_received(&self, received: bool) {
        self.last_outcome_received.store(received, Ordering::Release);
    }

    /// Whether the most recent attempt got a reply in time.
    pub fn last_outcome_received(&self) -> bool {
        self.last_outcome_received.load(Ordering::Acquire)
    }

    /// Whether the probe loop is still running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the loop as permanently stopped.
    pub fn retire(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Merge address information from a reply. Missing fields keep their
    /// previous value.
    pub fn update_resolved(&self, address: Option<IpAddr>, hostname: Option<String>) {
        if address.is_none() && hostname.is_none() {
            return;
        }
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if address.is_some() {
            resolved.address = address;
        }
        if hostname.is_some() {
            resolved.hostname = hostname;
        }
    }

    pub fn resolved(&self) -> ResolvedTarget {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Serializable view of this record as of `now`.
    pub fn status(&self, now: Instant) -> TargetStatus {
        let resolved = self.resolved();
        TargetStatus {
            host: self.host.clone(),
            active: self.is_active(),
            last_outcome_received: self.last_outcome_received(),
            seconds_since_last_attempt: self.since_last_attempt(now).as_secs_f64(),
            resolved_address: resolved.address,
            resolved_hostname: resolved.hostname,
        }
    }
}

/// Snapshot of a target for the JSON API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStatus {
    pub host: String,
    pub active: bool,
    pub last_outcome_received: bool,
    pub seconds_since_last_attempt: f64,
    pub resolved_address: Option<IpAddr>,
    pub resolved_hostname: Option<String>,
}

/// Ordered set of targets, fixed for the life of the process.
///
/// Cloning is cheap and every clone sees the same records. Records are never
/// added or removed after construction, so readers can iterate without
/// synchronizing with the probe loops.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Arc<[Arc<TargetRecord>]>,
}

impl TargetRegistry {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: hosts
                .into_iter()
                .map(|h| Arc::new(TargetRecord::new(h)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TargetRecord>> {
        self.targets.iter()
    }

    pub fn get(&self, host: &str) -> Option<&Arc<TargetRecord>> {
        self.targets.iter().find(|t| t.host() == host)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Status of every target, in registry order.
    pub fn statuses(&self, now: Instant) -> Vec<TargetStatus> {
        self.targets.iter().map(|t| t.status(now)).collect()
    }
}
