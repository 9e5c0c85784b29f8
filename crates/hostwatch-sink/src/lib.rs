//! Notification sinks for hostwatch.
//!
//! - [`ConsoleSink`] -- one line per message on stdout
//! - [`TelegramSink`] -- Bot API `sendMessage` to a chat or channel
//!
//! [`SinkCollector`] builds the configured sinks by id; `console` is always
//! available.

pub mod collector;
pub mod console;
pub mod error;
pub mod telegram;
pub mod traits;

pub use collector::SinkCollector;
pub use console::ConsoleSink;
pub use error::{SinkError, SinkResult};
pub use telegram::{TelegramClient, TelegramMessage, TelegramSink, TelegramUser, TELEGRAM_API};
pub use traits::Sink;
