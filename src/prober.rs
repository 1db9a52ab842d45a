//! Prober capability.
//!
//! The probe loop only talks to the transport through these traits:
//!
//! - [`Prober`]: opens a [`ProbeSession`] for a host (name resolution, socket setup)
//! - [`ProbeSession`]: sends echo requests bounded by a per-attempt timeout
//! - [`IcmpProber`]: production implementation on top of `surge-ping`

mod icmp;
mod traits;

pub use icmp::IcmpProber;
pub use traits::{EchoReply, ProbeOptions, ProbeOutcome, ProbeSession, Prober, ProberError};
