//! Wiring watch entries to monitors.
//!
//! A registrator turns one [`WatchConfig`] into file-backed host state, a
//! [`Connector`] with its sinks, a [`PresenceFilter`] seeded from the stored
//! presence, and a job on the matching [`Monitor`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hostwatch_config::{Config, Notify, WatchConfig};
use hostwatch_persist::{storage_id, FileStorage};
use hostwatch_probe::{PingResult, PingTarget, PortStatus, PortTarget, Probe};
use hostwatch_sink::SinkCollector;
use tracing::{info, warn};

use crate::connector::{Clock, Connector, ConnectorTarget, Templates};
use crate::error::{MonitorError, MonitorResult};
use crate::observer::PresenceFilter;
use crate::scheduler::Monitor;
use crate::state::HostState;

/// The file holding a watch's state inside `data_dir`.
///
/// The record id hashes the lowercased hostname, the port (port watches
/// only), the IP version and the monitor kind.
pub fn watch_storage(data_dir: &Path, watch: &WatchConfig) -> FileStorage {
    let host = watch.hostname().to_lowercase();
    let ipv = watch.ip_version();
    let id = match watch {
        WatchConfig::Ping(_) => storage_id([
            Some(host.as_str()),
            ipv.map(|v| v.as_str()),
            Some(watch.kind()),
        ]),
        WatchConfig::TcpPort(w) => {
            let port = w.port.to_string();
            storage_id([
                Some(host.as_str()),
                Some(port.as_str()),
                ipv.map(|v| v.as_str()),
                Some(watch.kind()),
            ])
        }
    };
    FileStorage::new(data_dir, &id)
}

/// Settings every registrator shares.
#[derive(Clone)]
pub struct RegistrationContext {
    pub data_dir: PathBuf,
    pub templates: Templates,
    pub sinks: Arc<SinkCollector>,
    pub clock: Option<Clock>,
}

impl RegistrationContext {
    pub fn from_config(config: &Config, sinks: Arc<SinkCollector>) -> MonitorResult<Self> {
        let time_zone = config.time_zone()?;
        Ok(Self {
            data_dir: config.data_dir.clone(),
            templates: Templates {
                on_alive: String::new(),
                on_dead: String::new(),
                time_zone,
                time_format: config.time_format.clone(),
            },
            sinks,
            clock: None,
        })
    }

    /// Build the state and connector for `watch`. Returns `None` when none
    /// of the watch's sinks exist.
    async fn connect(
        &self,
        watch: &WatchConfig,
        target: ConnectorTarget,
        notify: &Notify,
    ) -> MonitorResult<Option<(Connector, Option<bool>)>> {
        let storage = watch_storage(&self.data_dir, watch);
        let state = HostState::open(Arc::new(storage))?;
        let templates = Templates {
            on_alive: notify.on_alive_template.clone(),
            on_dead: notify.on_dead_template.clone(),
            ..self.templates.clone()
        };

        let mut connector = Connector::new(target, templates, state);
        if let Some(clock) = &self.clock {
            connector = connector.with_clock(Arc::clone(clock));
        }
        for id in &notify.sink {
            match self.sinks.get(id) {
                Some(sink) => connector.add_sink(sink),
                None => warn!(sink = %id, watch = %watch.describe(), "unknown sink"),
            }
        }
        if !connector.has_sinks() {
            warn!(watch = %watch.describe(), "skipping watch without any sink");
            return Ok(None);
        }

        let previous = connector.state().is_alive().await?;
        Ok(Some((connector, previous)))
    }
}

impl std::fmt::Debug for RegistrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationContext")
            .field("data_dir", &self.data_dir)
            .field("sinks", &self.sinks)
            .finish_non_exhaustive()
    }
}

/// Registers watches of one monitor kind.
#[async_trait]
pub trait ObserverRegistrator: Send + Sync {
    /// The `monitor` value this registrator handles.
    fn kind(&self) -> &'static str;

    /// Start watching. Returns `false` if the watch was skipped.
    async fn register(&self, watch: &WatchConfig) -> MonitorResult<bool>;
}

/// Registers `ping` watches.
pub struct PingRegistrator<P: Probe> {
    context: RegistrationContext,
    monitor: Arc<Monitor<P>>,
}

impl<P> PingRegistrator<P>
where
    P: Probe<Target = PingTarget, Status = PingResult>,
{
    pub fn new(context: RegistrationContext, monitor: Arc<Monitor<P>>) -> Self {
        Self { context, monitor }
    }
}

#[async_trait]
impl<P> ObserverRegistrator for PingRegistrator<P>
where
    P: Probe<Target = PingTarget, Status = PingResult>,
{
    fn kind(&self) -> &'static str {
        "ping"
    }

    async fn register(&self, watch: &WatchConfig) -> MonitorResult<bool> {
        let WatchConfig::Ping(ping) = watch else {
            return Err(MonitorError::KindMismatch {
                expected: self.kind(),
                found: watch.kind(),
            });
        };
        let target = ConnectorTarget::Ping {
            hostname: ping.hostname.clone(),
            ip_version: ping.ip_version,
        };
        let Some((connector, previous)) =
            self.context.connect(watch, target, &ping.notify).await?
        else {
            return Ok(false);
        };

        let observer = Arc::new(PresenceFilter::new(connector, previous));
        let probe_target = PingTarget::new(&ping.hostname).with_ip_version(ping.ip_version);
        let registered =
            self.monitor
                .register(watch.describe(), probe_target, watch.interval(), observer)?;
        info!(watch = %watch.describe(), previous = ?previous, "watch registered");
        Ok(registered)
    }
}

/// Registers `tcp-port` watches.
pub struct PortRegistrator<P: Probe> {
    context: RegistrationContext,
    monitor: Arc<Monitor<P>>,
}

impl<P> PortRegistrator<P>
where
    P: Probe<Target = PortTarget, Status = PortStatus>,
{
    pub fn new(context: RegistrationContext, monitor: Arc<Monitor<P>>) -> Self {
        Self { context, monitor }
    }
}

#[async_trait]
impl<P> ObserverRegistrator for PortRegistrator<P>
where
    P: Probe<Target = PortTarget, Status = PortStatus>,
{
    fn kind(&self) -> &'static str {
        "tcp-port"
    }

    async fn register(&self, watch: &WatchConfig) -> MonitorResult<bool> {
        let WatchConfig::TcpPort(port) = watch else {
            return Err(MonitorError::KindMismatch {
                expected: self.kind(),
                found: watch.kind(),
            });
        };
        let target = ConnectorTarget::Port {
            hostname: port.hostname.clone(),
            port: port.port,
            ip_version: port.ip_version,
        };
        let Some((connector, previous)) =
            self.context.connect(watch, target, &port.notify).await?
        else {
            return Ok(false);
        };

        let observer = Arc::new(PresenceFilter::new(connector, previous));
        let probe_target = PortTarget::new(&port.hostname, port.port)
            .with_ip_version(port.ip_version)
            .with_timeout(port.timeout());
        let registered =
            self.monitor
                .register(watch.describe(), probe_target, watch.interval(), observer)?;
        info!(watch = %watch.describe(), previous = ?previous, "watch registered");
        Ok(registered)
    }
}

/// Dispatches watches to the registrator of their kind.
#[derive(Default)]
pub struct RegistratorRepository {
    registrators: HashMap<&'static str, Arc<dyn ObserverRegistrator>>,
}

impl RegistratorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registrator, replacing any previous one of the same kind.
    pub fn register(&mut self, registrator: Arc<dyn ObserverRegistrator>) {
        self.registrators.insert(registrator.kind(), registrator);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.registrators.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Register `watch` with the registrator of its kind.
    pub async fn dispatch(&self, watch: &WatchConfig) -> MonitorResult<bool> {
        let registrator = self
            .registrators
            .get(watch.kind())
            .ok_or_else(|| MonitorError::UnknownKind(watch.kind().to_string()))?;
        registrator.register(watch).await
    }
}

impl std::fmt::Debug for RegistratorRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistratorRepository")
            .field("kinds", &self.kinds())
            .finish()
    }
}
