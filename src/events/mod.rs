//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: connection supervisor, receive loop, event workers,
//!   `SubscriberSet` workers (overflow/panic), `Dispatcher::shutdown`.
//! - **Consumers**: the subscriber listener spawned by the builder, and any
//!   receiver obtained from `Dispatcher::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
