//! TCP port reachability.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::ip::IpVersion;
use crate::traits::{Presence, Probe};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Host and port to connect to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortTarget {
    pub hostname: String,
    pub port: u16,
    /// Restrict name resolution to one family. Ignored for IP literals.
    pub ip_version: Option<IpVersion>,
    pub timeout: Duration,
}

impl PortTarget {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ip_version: None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_ip_version(mut self, ip_version: Option<IpVersion>) -> Self {
        self.ip_version = ip_version;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub open: bool,
}

impl Presence for PortStatus {
    fn is_alive(&self) -> bool {
        self.open
    }
}

/// Checks ports by opening (and immediately dropping) a TCP connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpPortChecker;

impl TcpPortChecker {
    pub fn new() -> Self {
        Self
    }

    async fn resolve(target: &PortTarget) -> Option<SocketAddr> {
        if let Ok(ip) = target.hostname.parse::<IpAddr>() {
            return Some(SocketAddr::new(ip, target.port));
        }
        let mut addrs = match lookup_host((target.hostname.as_str(), target.port)).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host = %target.hostname, error = %e, "resolution failed");
                return None;
            }
        };
        match target.ip_version {
            Some(version) => addrs.find(|addr| version.matches(addr)),
            None => addrs.next(),
        }
    }

    async fn connect(target: &PortTarget) -> bool {
        let Some(addr) = Self::resolve(target).await else {
            return false;
        };
        match TcpStream::connect(addr).await {
            Ok(_) => true,
            Err(e) => {
                debug!(%addr, error = %e, "connect failed");
                false
            }
        }
    }
}

#[async_trait]
impl Probe for TcpPortChecker {
    type Target = PortTarget;
    type Status = PortStatus;

    async fn probe(&self, target: &PortTarget) -> PortStatus {
        let open = match timeout(target.timeout, Self::connect(target)).await {
            Ok(open) => open,
            Err(_) => {
                debug!(host = %target.hostname, port = target.port, "connect timed out");
                false
            }
        };
        PortStatus { open }
    }
}
