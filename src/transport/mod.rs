//! # Transport boundary.
//!
//! The dispatcher never owns a socket. It consumes a connection through two
//! narrow traits:
//!
//! - [`Transport`]: the receive half, driven exclusively by the receive loop;
//! - [`Outbound`]: the send half, handed to handlers through
//!   [`ConnectionContext::send`](crate::ConnectionContext::send).
//!
//! An in-memory implementation lives in [`channel`]; adapters for real
//! websocket libraries implement the same two traits.

mod channel;

pub use channel::{ChannelTransport, Peer, channel};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// One raw message as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text message.
    Text(String),
    /// Binary message.
    Binary(Bytes),
}

impl Frame {
    /// Creates a text frame.
    pub fn text(s: impl Into<String>) -> Self {
        Frame::Text(s.into())
    }

    /// Creates a binary frame.
    pub fn binary(b: impl Into<Bytes>) -> Self {
        Frame::Binary(b.into())
    }

    /// Raw bytes of the frame regardless of its kind.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(s) => s.as_bytes(),
            Frame::Binary(b) => b,
        }
    }

    /// Text content, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(s) => Some(s),
            Frame::Binary(_) => None,
        }
    }
}

/// Receive half of a connection.
///
/// `recv` may be cancelled when the connection is shut down locally, so it
/// should be cancel-safe (losing at most the frame that was in flight).
#[async_trait]
pub trait Transport: Send + 'static {
    /// Waits for the next frame.
    ///
    /// - `Ok(Some(frame))`: a message arrived;
    /// - `Ok(None)`: orderly close;
    /// - `Err(_)`: the connection failed. It is treated as closed.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Send half shared with handlers.
    fn outbound(&self) -> Arc<dyn Outbound>;
}

/// Send half of a connection.
#[async_trait]
pub trait Outbound: Send + Sync + 'static {
    /// Sends one frame to the peer.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;
}
