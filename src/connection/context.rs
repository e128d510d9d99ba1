//! # Per-connection context.
//!
//! [`ConnectionContext`] is built once per accepted connection, before any
//! worker starts, and handed to every handler invocation as `Arc<ConnectionContext>`.
//! It has no setters: handlers that need per-connection mutable state keep it
//! themselves, keyed by [`ConnectionContext::id`].
//!
//! Besides data it carries two capabilities:
//! - [`send`](ConnectionContext::send) writes a frame back to the peer;
//! - [`close`](ConnectionContext::close) asks the receive loop to end the
//!   connection, which then broadcasts termination to every worker.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Ambient;
use crate::error::TransportError;
use crate::transport::{Frame, Outbound};

/// Opaque connection identifier (32 lowercase hex characters).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().into())
    }

    /// String form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable snapshot of one connection, shared by all of its workers.
pub struct ConnectionContext {
    id: ConnectionId,
    ambient: Ambient,
    opened_at: SystemTime,
    outbound: Arc<dyn Outbound>,
    cancel: CancellationToken,
}

impl ConnectionContext {
    pub(crate) fn new(
        ambient: Ambient,
        outbound: Arc<dyn Outbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: ConnectionId::generate(),
            ambient,
            opened_at: SystemTime::now(),
            outbound,
            cancel,
        }
    }

    /// Unique identifier of this connection.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Identity/session data captured at accept time.
    pub fn ambient(&self) -> &Ambient {
        &self.ambient
    }

    /// Wall-clock time the connection was accepted.
    pub fn opened_at(&self) -> SystemTime {
        self.opened_at
    }

    /// Sends a frame to the peer.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.outbound.send(frame).await
    }

    /// Requests teardown of this connection.
    ///
    /// Messages already routed to workers are still handled; the receive loop
    /// stops reading. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// True once the connection is being torn down, for whatever reason.
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("id", &self.id)
            .field("ambient", &self.ambient)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}
