//! ICMP echo prober.
//!
//! Sends echo requests with `surge-ping`. Each session resolves its host once
//! and opens a socket of the requested kind (raw when privileged, datagram
//! otherwise).

use std::net::IpAddr;

use socket2::Type;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;

use super::traits::{EchoReply, ProbeOptions, ProbeOutcome, ProbeSession, Prober, ProberError};

/// Echo payload size, matching the common `ping` default.
const PAYLOAD_SIZE: usize = 56;

/// Production prober backed by ICMP sockets.
#[derive(Debug, Clone, Default)]
pub struct IcmpProber;

impl IcmpProber {
    pub fn new() -> Self {
        Self
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    // Otherwise, resolve the hostname using tokio's DNS lookup
    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

fn client_config(address: IpAddr, privileged: bool) -> Config {
    let sock_type = if privileged { Type::RAW } else { Type::DGRAM };
    match address {
        IpAddr::V4(_) => Config::builder().sock_type_hint(sock_type).build(),
        IpAddr::V6(_) => Config::builder()
            .kind(ICMP::V6)
            .sock_type_hint(sock_type)
            .build(),
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn create_session(
        &self,
        host: &str,
        options: &ProbeOptions,
    ) -> Result<Box<dyn ProbeSession>, ProberError> {
        let address = resolve_host(host).await.map_err(|source| ProberError::Resolve {
            host: host.to_string(),
            source,
        })?;

        let client = Client::new(&client_config(address, options.privileged)).map_err(
            |source| ProberError::Socket {
                host: host.to_string(),
                source,
            },
        )?;

        let hostname = host.parse::<IpAddr>().is_err().then(|| host.to_string());

        tracing::debug!(
            host = %host,
            address = %address,
            privileged = options.privileged,
            "ICMP session created"
        );

        Ok(Box::new(IcmpSession {
            client,
            address,
            hostname,
            identifier: PingIdentifier(rand::random()),
            sequence: 0,
        }))
    }
}

struct IcmpSession {
    client: Client,
    address: IpAddr,
    hostname: Option<String>,
    identifier: PingIdentifier,
    sequence: u16,
}

#[async_trait::async_trait]
impl ProbeSession for IcmpSession {
    async fn send(&mut self, options: &ProbeOptions) -> ProbeOutcome {
        let mut pinger = self.client.pinger(self.address, self.identifier).await;
        pinger.timeout(options.timeout);
        let payload = [0u8; PAYLOAD_SIZE];

        for n in 0..options.count {
            if n > 0 {
                tokio::time::sleep(options.interval).await;
            }

            let sequence = PingSequence(self.sequence);
            self.sequence = self.sequence.wrapping_add(1);

            // surge-ping enforces the timeout itself; the outer bound guards
            // against a reply future that never resolves.
            match timeout(options.timeout, pinger.ping(sequence, &payload)).await {
                Ok(Ok((_, rtt))) => {
                    let mut reply = EchoReply::new(rtt).with_address(self.address);
                    if let Some(hostname) = &self.hostname {
                        reply = reply.with_hostname(hostname.clone());
                    }
                    return ProbeOutcome::Reply(reply);
                }
                Ok(Err(e)) => {
                    tracing::debug!(address = %self.address, error = %e, "Echo request failed");
                }
                Err(_) => {
                    tracing::debug!(
                        address = %self.address,
                        timeout_ms = options.timeout.as_millis(),
                        "Echo request timed out"
                    );
                }
            }
        }

        ProbeOutcome::NoReply
    }
}
