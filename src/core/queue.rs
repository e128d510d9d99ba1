//! # Event queues.
//!
//! One queue per registered event per connection. The receive loop is the only
//! producer, the event's worker the only consumer.
//!
//! ```text
//! receive loop ── push(Message) ──► [queue "chat"] ──► worker "chat"
//!              ── terminate()   ──►      ...
//! ```
//!
//! ## Rules
//! - FIFO per queue; nothing is promised across queues
//! - Unbounded unless a capacity is configured; a bounded queue rejects
//!   messages when full (`PushError::Full`), never blocks the producer
//! - A queue whose sender is gone reads as terminated once drained

use std::sync::Arc;

use tokio::sync::mpsc;

/// Unit placed on an event queue.
#[derive(Debug)]
pub(crate) enum DispatchItem<P> {
    /// A decoded message for this queue's event.
    Message { event: Arc<str>, payload: P },
    /// Stop after everything queued ahead of this item.
    Terminate,
}

/// Why a push was rejected.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushError {
    /// Bounded queue at capacity.
    Full,
    /// Worker already gone.
    Closed,
}

/// Producer half.
pub(crate) enum QueueTx<P> {
    Unbounded(mpsc::UnboundedSender<DispatchItem<P>>),
    Bounded(mpsc::Sender<DispatchItem<P>>),
}

/// Consumer half.
pub(crate) enum QueueRx<P> {
    Unbounded(mpsc::UnboundedReceiver<DispatchItem<P>>),
    Bounded(mpsc::Receiver<DispatchItem<P>>),
}

/// Creates a queue; `None` means unbounded.
pub(crate) fn queue<P>(bound: Option<usize>) -> (QueueTx<P>, QueueRx<P>) {
    match bound {
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        }
        Some(cap) => {
            let (tx, rx) = mpsc::channel(cap.max(1));
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        }
    }
}

impl<P> QueueTx<P> {
    /// Enqueues a message without waiting.
    pub(crate) fn push(&self, event: Arc<str>, payload: P) -> Result<(), PushError> {
        self.send(DispatchItem::Message { event, payload })
    }

    /// Enqueues the terminate marker and drops the sender.
    ///
    /// If a bounded queue is full the marker does not fit; dropping the sender
    /// still ends the worker once it has drained the queue.
    pub(crate) fn terminate(self) {
        let _ = self.send(DispatchItem::Terminate);
    }

    fn send(&self, item: DispatchItem<P>) -> Result<(), PushError> {
        match self {
            QueueTx::Unbounded(tx) => tx.send(item).map_err(|_| PushError::Closed),
            QueueTx::Bounded(tx) => tx.try_send(item).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PushError::Full,
                mpsc::error::TrySendError::Closed(_) => PushError::Closed,
            }),
        }
    }
}

impl<P> QueueRx<P> {
    /// Waits for the next item; `None` once every sender is gone and the queue is drained.
    pub(crate) async fn recv(&mut self) -> Option<DispatchItem<P>> {
        match self {
            QueueRx::Unbounded(rx) => rx.recv().await,
            QueueRx::Bounded(rx) => rx.recv().await,
        }
    }
}
