//! Runtime core: routing, per-connection topology and lifecycle.
//!
//! The public API from this module is [`Dispatcher`] (with its
//! [`DispatcherBuilder`]), [`DispatcherConfig`] and [`CloseReason`].
//!
//! Internal modules:
//! - [`builder`]: collects routes and subscribers, validates, freezes;
//! - [`dispatcher`]: shared handle, `accept` entry point, shutdown;
//! - [`supervisor`]: builds and tears down one connection's topology;
//! - [`receiver`]: the receive loop (decode, route, terminate broadcast);
//! - [`worker`]: sequential consumer of one event queue;
//! - [`queue`]: per-event queue with the terminate marker;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod dispatcher;
mod queue;
mod receiver;
mod shutdown;
mod supervisor;
mod worker;

pub use builder::DispatcherBuilder;
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use receiver::CloseReason;

use std::any::Any;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic_err: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_err.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic_err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
