//! # ReceiveLoop: reads frames, decodes them, routes them to event queues.
//!
//! ## Architecture
//! ```text
//! loop {
//!   select! {
//!     cancel.cancelled()  ─► Shutdown / Local            ─► break
//!     transport.recv()    ─► Ok(None)                    ─► Closed, break
//!                         ─► Err(e)                      ─► Failed, break
//!                         ─► Ok(Some(frame)) ─► codec.decode(frame)
//!                                                 ├─ Err / panic ─► DecodeFailed, continue
//!                                                 ├─ no route    ─► EventUnrouted, continue
//!                                                 ├─ full queue  ─► QueueOverflow, continue
//!                                                 └─ Ok          ─► queue.push(Message)
//!   }
//! }
//! for each queue: terminate()        (broadcast; the only stop signal workers get)
//! ```
//!
//! ## Rules
//! - Transport errors are terminal and never retried
//! - Decode failures and unrouted events never end the loop
//! - Every exit path, including unwinding, drops all queue senders

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::core::panic_message;
use crate::core::queue::{PushError, QueueTx};
use crate::events::{Bus, Event, EventKind};
use crate::transport::{Frame, Transport};

/// Why a connection ended.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The transport reported an orderly close.
    Closed,
    /// The transport failed; the connection is considered closed.
    Failed {
        /// Transport error message.
        error: String,
    },
    /// [`Dispatcher::shutdown`](crate::Dispatcher::shutdown) was called.
    Shutdown,
    /// A handler called [`ConnectionContext::close`](crate::ConnectionContext::close).
    Local,
    /// The receive loop itself panicked (for example inside a transport implementation).
    Faulted {
        /// Panic message.
        info: String,
    },
}

impl CloseReason {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CloseReason::Closed => "closed",
            CloseReason::Failed { .. } => "failed",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Local => "local",
            CloseReason::Faulted { .. } => "faulted",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Failed { error } => write!(f, "failed: {error}"),
            CloseReason::Faulted { info } => write!(f, "faulted: {info}"),
            other => f.write_str(other.as_label()),
        }
    }
}

/// Producer side of one connection topology.
pub(crate) struct ReceiveLoop<C: Codec, T> {
    transport: T,
    codec: Arc<C>,
    queues: HashMap<Arc<str>, QueueTx<C::Payload>>,
    connection: Arc<str>,
    bus: Bus,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

impl<C: Codec, T: Transport> ReceiveLoop<C, T> {
    /// `cancel` is the connection token; `shutdown` the dispatcher-wide parent,
    /// consulted only to tell [`CloseReason::Shutdown`] from [`CloseReason::Local`].
    pub(crate) fn new(
        transport: T,
        codec: Arc<C>,
        queues: HashMap<Arc<str>, QueueTx<C::Payload>>,
        connection: Arc<str>,
        bus: Bus,
        cancel: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            codec,
            queues,
            connection,
            bus,
            cancel,
            shutdown,
        }
    }

    /// Runs until the transport ends or the connection is cancelled,
    /// then broadcasts termination to every queue.
    pub(crate) async fn run(mut self) -> CloseReason {
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    break if self.shutdown.is_cancelled() {
                        CloseReason::Shutdown
                    } else {
                        CloseReason::Local
                    };
                }
                next = self.transport.recv() => next,
            };

            match next {
                Ok(Some(frame)) => self.route(&frame),
                Ok(None) => break CloseReason::Closed,
                Err(e) => {
                    warn!(error = %e, label = e.as_label(), "transport failed");
                    break CloseReason::Failed {
                        error: e.to_string(),
                    };
                }
            }
        };

        info!(reason = %reason, queues = self.queues.len(), "receive loop finished; terminating workers");
        for (_, tx) in self.queues.drain() {
            tx.terminate();
        }
        reason
    }

    fn route(&self, frame: &Frame) {
        let decoded =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.codec.decode(frame)));

        let (event, payload) = match decoded {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(error = %e, len = frame.as_bytes().len(), "dropping unparsable frame");
                self.publish(Event::new(EventKind::DecodeFailed).with_reason(e.reason));
                return;
            }
            Err(panic_err) => {
                let info = panic_message(panic_err.as_ref());
                warn!(panic = %info, "codec panicked; dropping frame");
                self.publish(
                    Event::new(EventKind::DecodeFailed).with_reason(format!("codec panicked: {info}")),
                );
                return;
            }
        };

        let Some((name, tx)) = self.queues.get_key_value(event.as_str()) else {
            debug!(event = %event, "no handler registered; dropping");
            self.publish(Event::new(EventKind::EventUnrouted).with_event_name(event));
            return;
        };

        match tx.push(Arc::clone(name), payload) {
            Ok(()) => {}
            Err(PushError::Full) => {
                warn!(event = %name, "event queue full; dropping message");
                self.publish(Event::new(EventKind::QueueOverflow).with_event_name(Arc::clone(name)));
            }
            Err(PushError::Closed) => {
                warn!(event = %name, "event worker gone; dropping message");
            }
        }
    }

    fn publish(&self, ev: Event) {
        self.bus
            .publish(ev.with_connection(Arc::clone(&self.connection)));
    }
}
