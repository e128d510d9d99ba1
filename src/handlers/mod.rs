//! Handler definitions.
//!
//! - [`Handler`] the trait every per-event handler implements
//! - [`HandlerFn`] closure-backed implementation
//! - [`HandlerRef`] shared handle stored in the route table

mod handler;
mod handler_fn;

pub use handler::{BoxHandlerFuture, Handler, HandlerRef};
pub use handler_fn::HandlerFn;
