//! Per-target probe loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::ProbeConfig;
use crate::metrics::{MetricsRecorder, TargetSeries};
use crate::prober::{ProbeOptions, ProbeOutcome, Prober, ProberError};

use super::target::TargetRecord;

/// Settings shared by every probe loop.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Pause after each cycle.
    pub interval: Duration,
    /// Per-attempt reply timeout.
    pub timeout: Duration,
    /// Use raw ICMP sockets.
    pub privileged: bool,
    /// Retry session setup on the next cycle instead of retiring the target.
    pub retry_session: bool,
}

impl ProbeSettings {
    fn options(&self) -> ProbeOptions {
        ProbeOptions::single(self.timeout, self.interval, self.privileged)
    }
}

impl From<&ProbeConfig> for ProbeSettings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            interval: config.interval,
            timeout: config.timeout,
            privileged: config.privileged,
            retry_session: config.retry_session,
        }
    }
}

/// Probe loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Dispatching,
    AwaitingReply,
    Succeeded,
    TimedOut,
    Errored,
}

/// Result of a single cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A reply arrived within the timeout.
    Succeeded { rtt: Duration },
    /// No reply within the timeout.
    TimedOut,
    /// The session could not be created.
    Errored(ProberError),
}

/// Repeatedly probes one target until its session setup fails.
pub struct ProbeLoop {
    target: Arc<TargetRecord>,
    prober: Arc<dyn Prober>,
    series: TargetSeries,
    settings: ProbeSettings,
    state: ProbeState,
}

impl ProbeLoop {
    /// Create a loop for `target`, registering its metric series eagerly.
    pub fn new(
        target: Arc<TargetRecord>,
        prober: Arc<dyn Prober>,
        recorder: &MetricsRecorder,
        settings: ProbeSettings,
    ) -> Self {
        let series = recorder.series(target.host());
        Self {
            target,
            prober,
            series,
            settings,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn target(&self) -> &Arc<TargetRecord> {
        &self.target
    }

    /// Run one dispatch / await cycle without the trailing sleep.
    pub async fn step(&mut self) -> CycleOutcome {
        // Must precede everything else in the cycle: the watchdog relies on it.
        self.target.mark_attempt_started();
        self.transition(ProbeState::Dispatching);

        let options = self.settings.options();
        let mut session = match self
            .prober
            .create_session(self.target.host(), &options)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.transition(ProbeState::Errored);
                return CycleOutcome::Errored(e);
            }
        };

        self.series.record_attempt();
        self.transition(ProbeState::AwaitingReply);

        match session.send(&options).await {
            ProbeOutcome::Reply(reply) if reply.rtt <= options.timeout => {
                self.series.record_success(reply.rtt.as_secs_f64());
                self.target.set_outcome_received(true);
                self.target
                    .update_resolved(reply.resolved_address, reply.resolved_hostname);
                self.transition(ProbeState::Succeeded);
                tracing::debug!(
                    host = %self.target.host(),
                    rtt_ms = reply.rtt.as_secs_f64() * 1000.0,
                    "Echo reply received"
                );
                CycleOutcome::Succeeded { rtt: reply.rtt }
            }
            ProbeOutcome::Reply(reply) => {
                tracing::debug!(
                    host = %self.target.host(),
                    rtt_ms = reply.rtt.as_secs_f64() * 1000.0,
                    "Echo reply arrived after timeout, ignoring"
                );
                self.target.set_outcome_received(false);
                self.transition(ProbeState::TimedOut);
                CycleOutcome::TimedOut
            }
            ProbeOutcome::NoReply => {
                tracing::debug!(host = %self.target.host(), "Echo request timed out");
                self.target.set_outcome_received(false);
                self.transition(ProbeState::TimedOut);
                CycleOutcome::TimedOut
            }
        }
    }

    /// Probe forever at the configured interval.
    ///
    /// Returns only when session setup fails and retries are disabled. The
    /// target is then retired and the returned error says why.
    pub async fn run(mut self) -> ProberError {
        self.series.set_active(true);
        tracing::info!(host = %self.target.host(), "Probe loop started");

        loop {
            if let CycleOutcome::Errored(e) = self.step().await {
                if !self.settings.retry_session {
                    self.target.retire();
                    self.series.set_active(false);
                    tracing::error!(
                        host = %self.target.host(),
                        error = %e,
                        "Failed to create probe session, target will no longer be probed"
                    );
                    return e;
                }
                tracing::warn!(
                    host = %self.target.host(),
                    error = %e,
                    "Failed to create probe session, retrying next cycle"
                );
            }

            self.transition(ProbeState::Idle);
            tokio::time::sleep(self.settings.interval).await;
        }
    }

    /// Spawn [`ProbeLoop::run`] on the Tokio runtime.
    pub fn spawn(self) -> JoinHandle<ProberError> {
        tokio::spawn(self.run())
    }

    fn transition(&mut self, next: ProbeState) {
        tracing::trace!(
            host = %self.target.host(),
            from = ?self.state,
            to = ?next,
            "Probe state transition"
        );
        self.state = next;
    }
}

impl std::fmt::Debug for ProbeLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeLoop")
            .field("host", &self.target.host())
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
