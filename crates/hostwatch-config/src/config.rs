//! Configuration types.
//!
//! Keys are camelCase in both JSON and TOML. Unknown keys are ignored.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use hostwatch_probe::IpVersion;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::time::{is_valid_format, TimeZoneSetting, DEFAULT_TIME_FORMAT};

/// Default TCP connect timeout, in milliseconds.
pub const DEFAULT_PORT_TIMEOUT_MS: u64 = 1000;

/// Name of the sink that always exists.
pub const CONSOLE_SINK: &str = "console";

/// Top-level hostwatch configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// `UTC`, `local` or a fixed offset such as `+03:00`.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// strftime pattern used for `$now`.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Directory holding one state file per watch.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialsConfig>,
    #[serde(default)]
    pub sinks: BTreeMap<String, SinkConfig>,
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            time_format: default_time_format(),
            data_dir: default_data_dir(),
            credentials: BTreeMap::new(),
            sinks: BTreeMap::new(),
            watch: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The parsed time zone.
    pub fn time_zone(&self) -> ConfigResult<TimeZoneSetting> {
        TimeZoneSetting::parse(&self.time_zone)
    }

    /// Check cross-references and value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        self.time_zone()?;
        if !is_valid_format(&self.time_format) {
            return Err(ConfigError::Invalid(format!(
                "timeFormat '{}' is not a valid strftime pattern",
                self.time_format
            )));
        }

        for (id, sink) in &self.sinks {
            if id == CONSOLE_SINK {
                return Err(ConfigError::Invalid(format!(
                    "sink id '{CONSOLE_SINK}' is reserved"
                )));
            }
            match sink {
                SinkConfig::Telegram { credentials, .. } => {
                    if !self.credentials.contains_key(credentials) {
                        return Err(ConfigError::Invalid(format!(
                            "sink '{id}' references unknown credentials '{credentials}'"
                        )));
                    }
                }
            }
        }

        for (index, watch) in self.watch.iter().enumerate() {
            let label = format!("watch[{index}] ({})", watch.describe());
            if watch.hostname().trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{label}: empty hostname")));
            }
            if watch.interval().is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "{label}: interval must be positive"
                )));
            }
            if let WatchConfig::TcpPort(port) = watch {
                if port.port == 0 {
                    return Err(ConfigError::Invalid(format!("{label}: port must be positive")));
                }
                if port.timeout == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "{label}: timeout must be positive"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// API credentials, keyed by id in [`Config::credentials`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialsConfig {
    #[serde(rename = "tg")]
    Telegram { token: String },
}

/// A named notification target, keyed by id in [`Config::sinks`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkConfig {
    #[serde(rename = "tg")]
    Telegram {
        /// Id of an entry in [`Config::credentials`].
        credentials: String,
        #[serde(rename = "channelId")]
        channel_id: i64,
    },
}

/// One watched target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "monitor")]
pub enum WatchConfig {
    #[serde(rename = "ping")]
    Ping(PingWatch),
    #[serde(rename = "tcp-port")]
    TcpPort(PortWatch),
}

/// Template and sink settings shared by every watch kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notify {
    pub on_alive_template: String,
    pub on_dead_template: String,
    /// Sink ids; `console` is always available.
    #[serde(default)]
    pub sink: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingWatch {
    pub hostname: String,
    #[serde(default)]
    pub ip_version: Option<IpVersion>,
    /// Seconds between probes.
    pub interval: u64,
    #[serde(flatten)]
    pub notify: Notify,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortWatch {
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub ip_version: Option<IpVersion>,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_port_timeout")]
    pub timeout: u64,
    /// Seconds between probes.
    pub interval: u64,
    #[serde(flatten)]
    pub notify: Notify,
}

fn default_port_timeout() -> u64 {
    DEFAULT_PORT_TIMEOUT_MS
}

impl PortWatch {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

impl WatchConfig {
    /// The monitor kind: `ping` or `tcp-port`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping(_) => "ping",
            Self::TcpPort(_) => "tcp-port",
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            Self::Ping(w) => &w.hostname,
            Self::TcpPort(w) => &w.hostname,
        }
    }

    pub fn ip_version(&self) -> Option<IpVersion> {
        match self {
            Self::Ping(w) => w.ip_version,
            Self::TcpPort(w) => w.ip_version,
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            Self::Ping(w) => Duration::from_secs(w.interval),
            Self::TcpPort(w) => Duration::from_secs(w.interval),
        }
    }

    pub fn notify(&self) -> &Notify {
        match self {
            Self::Ping(w) => &w.notify,
            Self::TcpPort(w) => &w.notify,
        }
    }

    /// Short human-readable label, e.g. `ping example.org` or
    /// `tcp-port ipv4 example.org:443`.
    pub fn describe(&self) -> String {
        let ipv = self
            .ip_version()
            .map(|v| format!("ipv{v} "))
            .unwrap_or_default();
        match self {
            Self::Ping(w) => format!("ping {ipv}{}", w.hostname),
            Self::TcpPort(w) => format!("tcp-port {ipv}{}:{}", w.hostname, w.port),
        }
    }
}
