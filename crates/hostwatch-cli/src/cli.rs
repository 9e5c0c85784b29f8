use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hostwatch_probe::IpVersion;

#[derive(Parser)]
#[command(
    name = "hostwatch",
    about = "Host and port availability monitor with notifications",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch every configured target until interrupted
    Run(ConfigArgs),
    /// Validate a configuration and summarize it
    Check(ConfigArgs),
    /// Show the last recorded state of every watch
    Status(ConfigArgs),
    /// Ping a host once
    Ping(PingArgs),
    /// Check a TCP port once
    Port(PortArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Configuration file (.json or .toml)
    #[arg(short, long, default_value = "./data/config.json")]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct PingArgs {
    pub host: String,
    /// Force IPv4 or IPv6
    #[arg(long, value_parser = parse_ip_version)]
    pub ipv: Option<IpVersion>,
    /// Echo requests to send
    #[arg(short = 'n', long, default_value = "3")]
    pub count: u32,
}

#[derive(Args)]
pub struct PortArgs {
    pub host: String,
    pub port: u16,
    /// Resolve to IPv4 or IPv6 only
    #[arg(long, value_parser = parse_ip_version)]
    pub ipv: Option<IpVersion>,
    /// Connect timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub timeout: u64,
}

fn parse_ip_version(s: &str) -> Result<IpVersion, String> {
    match s {
        "4" => Ok(IpVersion::V4),
        "6" => Ok(IpVersion::V6),
        other => Err(format!("expected 4 or 6, got '{other}'")),
    }
}
