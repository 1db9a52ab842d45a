//! Core prober traits and types.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while setting up a probe session.
#[derive(Debug, Error)]
pub enum ProberError {
    /// Host name could not be resolved to an address.
    #[error("failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// ICMP socket could not be opened (usually a permission problem).
    #[error("failed to open ICMP socket for '{host}': {source}")]
    Socket {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other session setup failure.
    #[error("session error: {0}")]
    Session(String),
}

/// Parameters for one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Number of echo requests to send. The probe loop always uses 1.
    pub count: u16,
    /// Upper bound on the wait for each reply.
    pub timeout: Duration,
    /// Pause between requests when `count > 1`.
    pub interval: Duration,
    /// Use raw sockets instead of unprivileged datagram sockets.
    pub privileged: bool,
}

impl ProbeOptions {
    /// Options for a single echo request.
    pub fn single(timeout: Duration, interval: Duration, privileged: bool) -> Self {
        Self {
            count: 1,
            timeout,
            interval,
            privileged,
        }
    }
}

/// A reply received before the attempt's timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    /// Measured round-trip time.
    pub rtt: Duration,
    /// Address the reply came from, when known.
    pub resolved_address: Option<IpAddr>,
    /// Host name the address was resolved from, when known.
    pub resolved_hostname: Option<String>,
}

impl EchoReply {
    pub fn new(rtt: Duration) -> Self {
        Self {
            rtt,
            resolved_address: None,
            resolved_hostname: None,
        }
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.resolved_address = Some(address);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.resolved_hostname = Some(hostname.into());
        self
    }
}

/// Result of one probe attempt.
///
/// A missing reply is an expected observation, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Reply(EchoReply),
    NoReply,
}

/// An open session able to send echo requests to one host.
#[async_trait::async_trait]
pub trait ProbeSession: Send {
    /// Send `options.count` echo requests and return the first reply.
    ///
    /// Implementations must return within roughly
    /// `count * (timeout + interval)`. The watchdog exists for transports
    /// that do not.
    async fn send(&mut self, options: &ProbeOptions) -> ProbeOutcome;
}

/// Factory for probe sessions.
///
/// # Error Handling
///
/// `create_session` fails only when the host cannot be probed at all
/// (unresolvable name, socket permission failure). Lost or late replies are
/// reported by [`ProbeSession::send`] as [`ProbeOutcome::NoReply`].
#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Prepare a session for `host` in the socket mode given by `options`.
    async fn create_session(
        &self,
        host: &str,
        options: &ProbeOptions,
    ) -> Result<Box<dyn ProbeSession>, ProberError>;
}
