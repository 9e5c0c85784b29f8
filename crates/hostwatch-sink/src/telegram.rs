//! Telegram Bot API client and sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SinkError, SinkResult};
use crate::traits::Sink;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// The bot account behind a token, as returned by `getMe`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// A sent message.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageArgs<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Authenticated Bot API client.
pub struct TelegramClient {
    http: Client,
    api_base: String,
    token: String,
    me: TelegramUser,
}

impl TelegramClient {
    /// Connect to the public Bot API, verifying `token` with `getMe`.
    pub async fn connect(token: &str) -> SinkResult<Self> {
        Self::connect_to(TELEGRAM_API, token).await
    }

    /// Connect to a Bot API server at `api_base`.
    pub async fn connect_to(api_base: &str, token: &str) -> SinkResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let api_base = api_base.trim_end_matches('/').to_string();

        let me: TelegramUser =
            call(&http, &api_base, token, "getMe", &serde_json::Map::new()).await?;
        debug!(bot = me.username.as_deref().unwrap_or(&me.first_name), "telegram bot connected");

        Ok(Self {
            http,
            api_base,
            token: token.to_string(),
            me,
        })
    }

    pub fn me(&self) -> &TelegramUser {
        &self.me
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> SinkResult<TelegramMessage> {
        let args = SendMessageArgs { chat_id, text };
        call(&self.http, &self.api_base, &self.token, "sendMessage", &args).await
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .field("me", &self.me)
            .finish_non_exhaustive()
    }
}

async fn call<A, T>(http: &Client, base: &str, token: &str, method: &str, args: &A) -> SinkResult<T>
where
    A: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let url = format!("{base}/bot{token}/{method}");
    let response: ApiResponse<T> = http.post(url).json(args).send().await?.json().await?;

    match response {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => Err(SinkError::Api {
            method: method.to_string(),
            description: description.unwrap_or_else(|| "no result".to_string()),
        }),
    }
}

/// Posts messages to one chat.
#[derive(Clone, Debug)]
pub struct TelegramSink {
    client: Arc<TelegramClient>,
    chat_id: i64,
}

impl TelegramSink {
    pub fn new(client: Arc<TelegramClient>, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait]
impl Sink for TelegramSink {
    async fn flush(&self, message: &str) -> bool {
        match self.client.send_message(self.chat_id, message).await {
            Ok(_) => true,
            Err(e) => {
                warn!(chat = self.chat_id, error = %e, "telegram delivery failed");
                false
            }
        }
    }
}
