//! Smokeping Exporter Binary Entry Point
//!
//! Starts one probe loop per target host, the stuck-loop watchdog, and the
//! scrape server. Core functionality is provided by the `smokeping_exporter`
//! library crate.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use smokeping_exporter::{
    AppConfig, ExporterError, IcmpProber, MetricsRecorder, ProbeLoop, ProbeSettings, Prober,
    STUCK_EXIT_CODE, TargetRegistry, Watchdog,
    config::parse_duration,
    server::{AppState, create_router},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ICMP latency exporter for Prometheus
#[derive(Parser, Debug)]
#[command(name = "smokeping-exporter", version, about, long_about = None)]
struct Cli {
    /// Hosts to probe (hostnames or IP addresses)
    hosts: Vec<String>,

    /// Path to a YAML configuration file
    #[arg(short, long, env = "SMOKEPING_CONFIG")]
    config: Option<PathBuf>,

    /// Debug mode
    #[arg(long)]
    debug: bool,

    /// Address on which to expose metrics and web interface
    #[arg(long = "web.listen-address", env = "SMOKEPING_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// A comma delimited list of buckets to use
    #[arg(long)]
    buckets: Option<String>,

    /// Run in privileged ICMP mode
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    privileged: Option<bool>,

    /// Ping interval seconds
    #[arg(long = "ping.interval")]
    ping_interval: Option<u64>,

    /// Ping timeout seconds
    #[arg(long = "ping.timeout")]
    ping_timeout: Option<u64>,

    /// How often the watchdog inspects probe loops (e.g. 45s)
    #[arg(long = "watchdog.check-period", value_parser = parse_duration)]
    check_period: Option<Duration>,

    /// Age of a probe attempt after which the process exits (e.g. 2m)
    #[arg(long = "watchdog.stuck-threshold", value_parser = parse_duration)]
    stuck_threshold: Option<Duration>,

    /// Retry session setup every interval instead of dropping the target
    #[arg(long = "probe.retry-session")]
    retry_session: bool,
}

impl Cli {
    /// Build the effective configuration (CLI > config file > defaults).
    fn into_config(self) -> Result<AppConfig, ExporterError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if !self.hosts.is_empty() {
            config.hosts = self.hosts;
        }
        config.debug |= self.debug;
        if let Some(addr) = self.listen_address {
            config.web.listen_address = addr;
        }
        if let Some(path) = self.telemetry_path {
            config.web.telemetry_path = path;
        }
        if let Some(buckets) = self.buckets {
            config.probe.buckets = buckets;
        }
        if let Some(privileged) = self.privileged {
            config.probe.privileged = privileged;
        }
        if let Some(secs) = self.ping_interval {
            config.probe.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.ping_timeout {
            config.probe.timeout = Duration::from_secs(secs);
        }
        if let Some(period) = self.check_period {
            config.watchdog.check_period = period;
        }
        if let Some(threshold) = self.stuck_threshold {
            config.watchdog.stuck_threshold = threshold;
        }
        config.probe.retry_session |= self.retry_session;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), ExporterError> {
    let config = Cli::parse().into_config()?;

    // Initialize tracing
    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Smokeping Exporter");
    tracing::info!(
        "Targets: {}, interval: {:?}, timeout: {:?}, privileged: {}",
        config.hosts.len(),
        config.probe.interval,
        config.probe.timeout,
        config.probe.privileged,
    );

    // Buckets must be valid before any probe loop starts.
    let buckets = config.bucket_set()?;
    let recorder = Arc::new(MetricsRecorder::new(&buckets)?);

    let registry = TargetRegistry::new(config.hosts.iter().cloned());
    if registry.is_empty() {
        tracing::warn!("No target hosts configured, only the scrape endpoint will run");
    }

    let prober: Arc<dyn Prober> = Arc::new(IcmpProber::new());
    let settings = ProbeSettings::from(&config.probe);
    for target in registry.iter() {
        ProbeLoop::new(
            Arc::clone(target),
            Arc::clone(&prober),
            &recorder,
            settings.clone(),
        )
        .spawn();
    }

    let watchdog = Watchdog::from_config(registry.clone(), &config.watchdog);

    let app = create_router(AppState {
        recorder,
        registry,
        telemetry_path: config.web.telemetry_path.clone(),
    });

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ExporterError::Bind { addr, source })?;

    tracing::info!("Listening on {}", addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    // The watchdog is polled here on the main thread, not on the worker
    // threads running the probe loops.
    tokio::select! {
        result = server => {
            result.map_err(ExporterError::Serve)?;
            tracing::info!("Shutdown complete");
        }
        stuck = watchdog.run() => {
            tracing::error!("{}, exiting", stuck);
            std::process::exit(STUCK_EXIT_CODE);
        }
    }

    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
