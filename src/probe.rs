//! Probe scheduling.
//!
//! One independent probe loop per target, each in its own Tokio task.
//!
//! # Architecture
//!
//! - [`TargetRecord`]: per-target state shared with the watchdog and the API
//! - [`TargetRegistry`]: fixed, ordered set of targets built once at startup
//! - [`ProbeLoop`]: the per-target dispatch / await / sleep cycle
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use smokeping_exporter::{
//!     BucketSet, IcmpProber, MetricsRecorder, ProbeConfig, ProbeLoop, ProbeSettings,
//!     TargetRegistry,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::new(&BucketSet::parse("0.001,0.01,0.1")?)?;
//! let registry = TargetRegistry::new(["10.0.0.1", "10.0.0.2"]);
//! let settings = ProbeSettings::from(&ProbeConfig::default());
//! let prober = Arc::new(IcmpProber::new());
//!
//! for target in registry.iter() {
//!     ProbeLoop::new(Arc::clone(target), prober.clone(), &recorder, settings.clone()).spawn();
//! }
//! # Ok(())
//! # }
//! ```

mod runner;
mod target;

pub use runner::{CycleOutcome, ProbeLoop, ProbeSettings, ProbeState};
pub use target::{ResolvedTarget, TargetRecord, TargetRegistry, TargetStatus};
