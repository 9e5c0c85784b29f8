//! Named sink registry built from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use hostwatch_config::{Config, CredentialsConfig, SinkConfig, CONSOLE_SINK};
use tracing::{info, warn};

use crate::console::ConsoleSink;
use crate::error::{SinkError, SinkResult};
use crate::telegram::{TelegramClient, TelegramSink, TELEGRAM_API};
use crate::traits::Sink;

/// Sinks by id. `console` is always present.
pub struct SinkCollector {
    sinks: BTreeMap<String, Arc<dyn Sink>>,
}

impl SinkCollector {
    /// A collector holding only the console sink.
    pub fn new() -> Self {
        Self::with_console(Arc::new(ConsoleSink::new()))
    }

    /// A collector whose `console` sink is `console`.
    pub fn with_console(console: Arc<dyn Sink>) -> Self {
        let mut sinks = BTreeMap::new();
        sinks.insert(CONSOLE_SINK.to_string(), console);
        Self { sinks }
    }

    /// Build every configured sink against the public Telegram API.
    pub async fn from_config(config: &Config) -> Self {
        let mut collector = Self::new();
        collector.extend_from_config(config, TELEGRAM_API).await;
        collector
    }

    /// Add the sinks of `config`, connecting Telegram clients to `api_base`.
    ///
    /// One client is created per credentials entry and shared by all sinks
    /// using it. Sinks whose client cannot connect are skipped.
    pub async fn extend_from_config(&mut self, config: &Config, api_base: &str) {
        let mut pool: BTreeMap<&str, Option<Arc<TelegramClient>>> = BTreeMap::new();

        for (id, sink) in &config.sinks {
            match sink {
                SinkConfig::Telegram {
                    credentials,
                    channel_id,
                } => {
                    if !pool.contains_key(credentials.as_str()) {
                        let client = match connect(config, credentials, api_base).await {
                            Ok(client) => Some(Arc::new(client)),
                            Err(e) => {
                                warn!(credentials = %credentials, error = %e, "telegram client unavailable");
                                None
                            }
                        };
                        pool.insert(credentials.as_str(), client);
                    }

                    match pool.get(credentials.as_str()).cloned().flatten() {
                        Some(client) => {
                            info!(sink = %id, chat = channel_id, "telegram sink ready");
                            self.insert(id.clone(), Arc::new(TelegramSink::new(client, *channel_id)));
                        }
                        None => warn!(sink = %id, "skipping sink without a working client"),
                    }
                }
            }
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, sink: Arc<dyn Sink>) {
        self.sinks.insert(id.into(), sink);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Sink>> {
        self.sinks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sinks.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sinks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for SinkCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SinkCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkCollector")
            .field("sinks", &self.sinks.keys().collect::<Vec<_>>())
            .finish()
    }
}

async fn connect(config: &Config, credentials: &str, api_base: &str) -> SinkResult<TelegramClient> {
    match config.credentials.get(credentials) {
        Some(CredentialsConfig::Telegram { token }) => {
            TelegramClient::connect_to(api_base, token).await
        }
        None => Err(SinkError::MissingCredentials(credentials.to_string())),
    }
}
