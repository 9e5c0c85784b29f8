//! Reachability probes for hostwatch.
//!
//! Every probe implements [`Probe`] and reports reachability as a status
//! value rather than an error:
//!
//! - [`SystemPing`] -- ICMP echo through the system `ping` binary
//! - [`TcpPortChecker`] -- TCP connect with a timeout

pub mod ip;
pub mod ping;
pub mod port;
pub mod traits;

pub use ip::IpVersion;
pub use ping::{parse_ping_output, PingResult, PingTarget, SystemPing};
pub use port::{PortStatus, PortTarget, TcpPortChecker, DEFAULT_CONNECT_TIMEOUT};
pub use traits::{Presence, Probe};
