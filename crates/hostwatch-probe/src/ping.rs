//! ICMP reachability via the system `ping` binary.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::ip::IpVersion;
use crate::traits::{Presence, Probe};

static LOSS_REGEX: OnceLock<Regex> = OnceLock::new();
static RTT_REGEX: OnceLock<Regex> = OnceLock::new();

fn loss_regex() -> &'static Regex {
    LOSS_REGEX.get_or_init(|| {
        Regex::new(r" (\d{1,3})(?:\.\d+)?% packet loss").expect("static regex pattern is valid")
    })
}

fn rtt_regex() -> &'static Regex {
    RTT_REGEX.get_or_init(|| {
        Regex::new(r"= \d+(?:\.\d+)?/(\d+(?:\.\d+)?)/").expect("static regex pattern is valid")
    })
}

/// Host to ping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingTarget {
    pub hostname: String,
    pub ip_version: Option<IpVersion>,
}

impl PingTarget {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ip_version: None,
        }
    }

    pub fn with_ip_version(mut self, ip_version: Option<IpVersion>) -> Self {
        self.ip_version = ip_version;
        self
    }
}

/// Summary of one `ping` run.
#[derive(Clone, Debug, PartialEq)]
pub struct PingResult {
    pub alive: bool,
    /// Packet loss in percent.
    pub loss: u8,
    /// Average round trip in milliseconds.
    pub rtt_avg: Option<f64>,
}

impl PingResult {
    pub fn dead() -> Self {
        Self {
            alive: false,
            loss: 100,
            rtt_avg: None,
        }
    }
}

impl Presence for PingResult {
    fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Parse the summary lines of `ping` output (iputils and BSD formats).
///
/// Output without a packet-loss line reads as a dead host.
pub fn parse_ping_output(stdout: &str) -> PingResult {
    let Some(loss) = loss_regex()
        .captures(stdout)
        .and_then(|c| c[1].parse::<u8>().ok())
    else {
        return PingResult::dead();
    };
    let rtt_avg = rtt_regex()
        .captures(stdout)
        .and_then(|c| c[1].parse::<f64>().ok());

    PingResult {
        alive: loss < 100,
        loss,
        rtt_avg,
    }
}

/// Pings by spawning the system `ping` command.
#[derive(Clone, Debug)]
pub struct SystemPing {
    program: String,
    count: u32,
}

impl Default for SystemPing {
    fn default() -> Self {
        Self {
            program: "ping".to_string(),
            count: 3,
        }
    }
}

impl SystemPing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo requests sent per probe.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    /// Use a different executable than `ping` from `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Arguments passed to the ping executable for `target`.
    pub fn args(&self, target: &PingTarget) -> Vec<String> {
        let mut args = vec![target.hostname.clone()];
        if let Some(version) = target.ip_version {
            args.push(version.ping_flag().to_string());
        }
        args.push("-c".to_string());
        args.push(self.count.to_string());
        args
    }
}

#[async_trait]
impl Probe for SystemPing {
    type Target = PingTarget;
    type Status = PingResult;

    async fn probe(&self, target: &PingTarget) -> PingResult {
        let output = match Command::new(&self.program)
            .args(self.args(target))
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                debug!(program = %self.program, error = %e, "failed to spawn ping");
                return PingResult::dead();
            }
        };

        if !output.status.success() {
            debug!(host = %target.hostname, status = %output.status, "ping reported failure");
            return PingResult::dead();
        }

        let result = parse_ping_output(&String::from_utf8_lossy(&output.stdout));
        debug!(host = %target.hostname, alive = result.alive, loss = result.loss, "ping done");
        result
    }
}
