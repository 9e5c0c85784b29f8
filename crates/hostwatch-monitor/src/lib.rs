//! Polling monitors and notification wiring for hostwatch.
//!
//! # Pipeline
//!
//! ```text
//! Monitor<P> --status--> PresenceFilter --change--> Connector --message--> Sinks
//!                                                       |
//!                                                   HostState (file)
//! ```
//!
//! - [`Monitor`] probes each registered target immediately and then on a
//!   fixed interval.
//! - [`PresenceFilter`] drops statuses whose presence did not change.
//! - [`Connector`] records the change in [`HostState`], renders the alive or
//!   dead template and delivers it to every attached sink.
//! - [`RegistratorRepository`] builds all of the above from a watch entry.

pub mod connector;
pub mod error;
pub mod observer;
pub mod registrator;
pub mod scheduler;
pub mod state;
pub mod template;

pub use connector::{Clock, Connector, ConnectorTarget, Templates};
pub use error::{MonitorError, MonitorResult};
pub use observer::{Observer, PresenceFilter};
pub use registrator::{
    watch_storage, ObserverRegistrator, PingRegistrator, PortRegistrator, RegistrationContext,
    RegistratorRepository,
};
pub use scheduler::Monitor;
pub use state::HostState;
pub use template::{format_elapsed, render, TemplateContext};
