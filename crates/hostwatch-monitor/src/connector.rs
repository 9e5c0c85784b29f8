//! Connectors turn presence changes into notifications.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostwatch_config::TimeZoneSetting;
use hostwatch_probe::{IpVersion, Presence};
use hostwatch_sink::Sink;
use tracing::{info, warn};

use crate::observer::Observer;
use crate::state::HostState;
use crate::template::{render, TemplateContext};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What a connector reports on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectorTarget {
    Ping {
        hostname: String,
        ip_version: Option<IpVersion>,
    },
    Port {
        hostname: String,
        port: u16,
        ip_version: Option<IpVersion>,
    },
}

impl ConnectorTarget {
    pub fn hostname(&self) -> &str {
        match self {
            Self::Ping { hostname, .. } | Self::Port { hostname, .. } => hostname,
        }
    }

    fn port(&self) -> Option<u16> {
        match self {
            Self::Ping { .. } => None,
            Self::Port { port, .. } => Some(*port),
        }
    }

    fn ip_version(&self) -> Option<IpVersion> {
        match self {
            Self::Ping { ip_version, .. } | Self::Port { ip_version, .. } => *ip_version,
        }
    }
}

/// Templates and clock settings of a connector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Templates {
    pub on_alive: String,
    pub on_dead: String,
    pub time_zone: TimeZoneSetting,
    pub time_format: String,
}

/// Records each observed presence and notifies every attached sink.
pub struct Connector {
    target: ConnectorTarget,
    templates: Templates,
    state: HostState,
    sinks: Vec<Arc<dyn Sink>>,
    clock: Clock,
}

impl Connector {
    pub fn new(target: ConnectorTarget, templates: Templates, state: HostState) -> Self {
        Self {
            target,
            templates,
            state,
            sinks: Vec::new(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn has_sinks(&self) -> bool {
        !self.sinks.is_empty()
    }

    pub fn target(&self) -> &ConnectorTarget {
        &self.target
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    /// Handle one presence observation.
    pub async fn on_presence(&self, alive: bool) {
        let now = (self.clock)();
        let now_ms = now.timestamp_millis();

        let previous = match self.state.checked().await {
            Ok(checked) => checked,
            Err(e) => {
                warn!(host = self.target.hostname(), error = %e, "cannot read host state");
                None
            }
        };
        let elapsed_ms = now_ms - previous.unwrap_or(now_ms);
        let recorded = self.state.record(alive, now_ms);

        let template = if alive {
            &self.templates.on_alive
        } else {
            &self.templates.on_dead
        };
        let now_text = self
            .templates
            .time_zone
            .format(now, &self.templates.time_format);
        let message = render(
            template,
            &TemplateContext {
                now: &now_text,
                elapsed_ms,
                host: self.target.hostname(),
                port: self.target.port(),
                ip_version: self.target.ip_version(),
            },
        );
        info!(host = self.target.hostname(), alive, elapsed_ms, "presence changed");

        for sink in &self.sinks {
            if !sink.flush(&message).await {
                warn!(host = self.target.hostname(), "notification not delivered");
            }
        }

        if let Err(e) = recorded.await {
            warn!(host = self.target.hostname(), error = %e, "failed to persist host state");
        }
    }
}

#[async_trait]
impl<S> Observer<S> for Connector
where
    S: Presence + Send + 'static,
{
    async fn notify(&self, status: S) {
        self.on_presence(status.is_alive()).await;
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("target", &self.target)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}
