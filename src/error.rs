//! Process-level errors.
//!
//! Per-target failures never reach this type: they stay inside the probe loop
//! that produced them. Only startup and server failures end the process this
//! way. A stuck probe loop is reported separately by the watchdog.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;
use crate::metrics::MetricsError;

/// Fatal errors returned by the entrypoint.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Invalid configuration or bucket list.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Metric registration failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Scrape listener could not be bound.
    #[error("failed to start listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Scrape server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
