//! Stuck probe loop detection.
//!
//! The probe loops rely on the transport honouring its own timeout. When it
//! does not, the loop hangs inside a single attempt and cannot be interrupted
//! safely from inside the process. The watchdog notices this from the age of
//! each target's last attempt start and reports it; the entrypoint then exits
//! with [`STUCK_EXIT_CODE`] so that a process supervisor restarts the daemon.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::WatchdogConfig;
use crate::probe::TargetRegistry;

/// Process exit status reserved for a stuck probe loop.
pub const STUCK_EXIT_CODE: i32 = 10;

/// A target whose loop has not started an attempt within the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct StuckTarget {
    pub host: String,
    pub elapsed: Duration,
    pub threshold: Duration,
}

impl fmt::Display for StuckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probe loop for {} hangs since {:.2} seconds (threshold {:.0}s)",
            self.host,
            self.elapsed.as_secs_f64(),
            self.threshold.as_secs_f64()
        )
    }
}

/// Periodic inspector of every target's last attempt start.
#[derive(Debug, Clone)]
pub struct Watchdog {
    registry: TargetRegistry,
    check_period: Duration,
    stuck_threshold: Duration,
}

impl Watchdog {
    pub fn new(registry: TargetRegistry, check_period: Duration, stuck_threshold: Duration) -> Self {
        Self {
            registry,
            check_period,
            stuck_threshold,
        }
    }

    pub fn from_config(registry: TargetRegistry, config: &WatchdogConfig) -> Self {
        Self::new(registry, config.check_period, config.stuck_threshold)
    }

    pub fn check_period(&self) -> Duration {
        self.check_period
    }

    pub fn stuck_threshold(&self) -> Duration {
        self.stuck_threshold
    }

    /// Inspect every active target once, as of `now`.
    ///
    /// Retired targets are skipped: their loop exited for a known reason and
    /// is not hanging.
    pub fn check(&self, now: Instant) -> Option<StuckTarget> {
        self.registry
            .iter()
            .filter(|t| t.is_active())
            .find_map(|target| {
                let elapsed = target.since_last_attempt(now);
                (elapsed > self.stuck_threshold).then(|| StuckTarget {
                    host: target.host().to_string(),
                    elapsed,
                    threshold: self.stuck_threshold,
                })
            })
    }

    /// Check every `check_period` until a target is stuck, then return it.
    ///
    /// The caller is expected to terminate the process.
    pub async fn run(self) -> StuckTarget {
        tracing::info!(
            targets = self.registry.len(),
            check_period = ?self.check_period,
            stuck_threshold = ?self.stuck_threshold,
            "Watchdog started"
        );

        loop {
            tokio::time::sleep(self.check_period).await;
            if let Some(stuck) = self.check(Instant::now()) {
                tracing::error!(
                    host = %stuck.host,
                    elapsed_secs = stuck.elapsed.as_secs_f64(),
                    "Probe loop is stuck"
                );
                return stuck;
            }
            tracing::trace!("Watchdog check passed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_check_detects_stale_target() {
        let registry = TargetRegistry::new(["fresh", "stale"]);
        let watchdog = Watchdog::new(
            registry.clone(),
            Duration::from_secs(45),
            Duration::from_secs(120),
        );

        tokio::time::advance(Duration::from_secs(121)).await;
        registry.get("fresh").unwrap().mark_attempt_started();

        let stuck = watchdog.check(Instant::now()).unwrap();
        assert_eq!(stuck.host, "stale");
        assert_eq!(stuck.elapsed, Duration::from_secs(121));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_at_threshold_is_not_stuck() {
        let registry = TargetRegistry::new(["a"]);
        let watchdog = Watchdog::new(registry, Duration::from_secs(45), Duration::from_secs(120));

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(watchdog.check(Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_skips_retired_targets() {
        let registry = TargetRegistry::new(["dead"]);
        registry.get("dead").unwrap().retire();
        let watchdog = Watchdog::new(registry, Duration::from_secs(45), Duration::from_secs(120));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(watchdog.check(Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fires_within_one_period_of_threshold() {
        let registry = TargetRegistry::new(["hung"]);
        let watchdog = Watchdog::new(registry, Duration::from_secs(45), Duration::from_secs(120));

        let start = Instant::now();
        let stuck = watchdog.run().await;
        let fired_after = start.elapsed();

        assert_eq!(stuck.host, "hung");
        // Checks at 45s, 90s, 135s; the first past 120s wins.
        assert_eq!(fired_after, Duration::from_secs(135));
        assert!(fired_after <= Duration::from_secs(120 + 45));
    }

    #[test]
    fn test_stuck_display() {
        let stuck = StuckTarget {
            host: "10.0.0.1".to_string(),
            elapsed: Duration::from_millis(135_500),
            threshold: Duration::from_secs(120),
        };
        assert_eq!(
            stuck.to_string(),
            "probe loop for 10.0.0.1 hangs since 135.50 seconds (threshold 120s)"
        );
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(STUCK_EXIT_CODE, 10);
    }
}
