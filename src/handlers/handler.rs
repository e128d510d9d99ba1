//! # Handler abstraction.
//!
//! A [`Handler`] is invoked once per message routed to its event, always from
//! that event's dedicated worker, so calls for the same event on the same
//! connection never overlap and arrive in transport order.
//!
//! The common handle type is [`HandlerRef`], an `Arc<dyn Handler<P>>` shared by
//! every connection served by one dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::connection::ConnectionContext;
use crate::error::HandlerError;

/// Boxed future returned by [`Handler::call`].
pub type BoxHandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// Shared handle to a handler.
pub type HandlerRef<P> = Arc<dyn Handler<P>>;

/// # Per-event message handler.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use evdispatch::{BoxHandlerFuture, ConnectionContext, Frame, Handler};
///
/// struct Echo;
///
/// impl Handler<String> for Echo {
///     fn call(&self, ctx: Arc<ConnectionContext>, payload: String) -> BoxHandlerFuture {
///         Box::pin(async move {
///             let _ = ctx.send(Frame::text(payload)).await;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Handler<P>: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handles one message.
    ///
    /// An `Err` or a panic is logged and reported; the worker moves on to the
    /// next message either way.
    fn call(&self, ctx: Arc<ConnectionContext>, payload: P) -> BoxHandlerFuture;
}
