//! Configuration for hostwatch.
//!
//! A configuration names credentials, notification sinks and the list of
//! watched targets. It is read from JSON or TOML with [`load_config`] and
//! checked with [`Config::validate`].

pub mod config;
pub mod error;
pub mod loader;
pub mod time;

pub use config::{
    Config, CredentialsConfig, Notify, PingWatch, PortWatch, SinkConfig, WatchConfig,
    CONSOLE_SINK, DEFAULT_PORT_TIMEOUT_MS,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use time::{TimeZoneSetting, DEFAULT_TIME_FORMAT};
