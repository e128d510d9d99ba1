//! In-memory transport backed by Tokio channels.
//!
//! [`channel`] returns a [`ChannelTransport`] for the dispatcher and a [`Peer`]
//! that plays the remote side: it pushes inbound frames, closes or fails the
//! connection, and reads what handlers sent back.
//!
//! ```rust
//! use evdispatch::transport::{self, Frame};
//!
//! let (transport, mut peer) = transport::channel();
//! peer.send(Frame::text("hello"));
//! peer.close();
//! # drop(transport);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Frame, Outbound, Transport};
use crate::error::TransportError;

type Inbound = Result<Frame, TransportError>;

/// Creates a connected transport/peer pair.
pub fn channel() -> (ChannelTransport, Peer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Frame>();

    let transport = ChannelTransport {
        inbound: in_rx,
        outbound: Arc::new(ChannelOutbound { tx: out_tx }),
    };
    let peer = Peer {
        inbound: Some(in_tx),
        outbound: out_rx,
    };
    (transport, peer)
}

/// Dispatcher side of an in-memory connection.
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: Arc<ChannelOutbound>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn outbound(&self) -> Arc<dyn Outbound> {
        self.outbound.clone()
    }
}

struct ChannelOutbound {
    tx: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl Outbound for ChannelOutbound {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Remote side of an in-memory connection.
pub struct Peer {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::UnboundedReceiver<Frame>,
}

impl Peer {
    /// Delivers a frame to the dispatcher. Returns `false` once the connection is closed.
    pub fn send(&self, frame: Frame) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Ok(frame)).is_ok(),
            None => false,
        }
    }

    /// Shorthand for `send(Frame::text(..))`.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Frame::text(text))
    }

    /// Orderly close: the dispatcher sees `Ok(None)` after the frames already sent.
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Fails the connection: the dispatcher sees `Err(error)` after the frames already sent.
    pub fn fail(&mut self, error: TransportError) {
        if let Some(tx) = self.inbound.take() {
            let _ = tx.send(Err(error));
        }
    }

    /// Next frame sent by a handler, or `None` once the dispatcher side is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }
}
