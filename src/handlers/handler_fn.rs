//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(Arc<ConnectionContext>, P) -> Fut`,
//! producing a fresh future per message. If the handler needs state shared
//! across messages or connections, capture an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use evdispatch::{ConnectionContext, HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef<String> = HandlerFn::arc("greet", |ctx: Arc<ConnectionContext>, who: String| async move {
//!     let _ = (ctx.id(), who);
//!     Ok::<_, HandlerError>(())
//! });
//!
//! assert_eq!(h.name(), "greet");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::connection::ConnectionContext;
use crate::error::HandlerError;
use crate::handlers::handler::{BoxHandlerFuture, Handler};

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut, P> Handler<P> for HandlerFn<F>
where
    F: Fn(Arc<ConnectionContext>, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    P: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, ctx: Arc<ConnectionContext>, payload: P) -> BoxHandlerFuture {
        Box::pin((self.f)(ctx, payload))
    }
}
