//! # EventWorker: sequential consumer of one event queue.
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► queue.recv()
//!   │     ├─ Message   ─► handler.call(ctx, payload)   (awaited, catch_unwind)
//!   │     │                 ├─ Ok        ─► continue
//!   │     │                 ├─ Err(e)    ─► warn + HandlerFailed,  continue
//!   │     │                 └─ panic     ─► error + HandlerPanicked, continue
//!   │     ├─ Terminate ─► break
//!   │     └─ None      ─► break (queue closed)
//! }
//! publish WorkerStopped{ handled }
//! ```
//!
//! ## Rules
//! - Invocations run **sequentially** (never concurrent for one worker)
//! - A failing or panicking invocation never stops the worker
//! - Nothing follows `Terminate` on a queue, so stopping there loses no message
//!   that arrived before the close

use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, trace, warn};

use crate::connection::ConnectionContext;
use crate::core::panic_message;
use crate::core::queue::{DispatchItem, QueueRx};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;

/// How a worker ended, returned to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Consumed the terminate marker.
    Terminated,
    /// Queue closed without a marker.
    Disconnected,
}

/// Consumes one event queue and feeds the handler.
///
/// The queue is passed to [`run`](Self::run) rather than stored, so the worker
/// itself stays `Sync` while invocations borrow it across awaits.
pub(crate) struct EventWorker<P> {
    event: Arc<str>,
    handler: HandlerRef<P>,
    ctx: Arc<ConnectionContext>,
    bus: Bus,
}

impl<P: Send + 'static> EventWorker<P> {
    pub(crate) fn new(
        event: Arc<str>,
        handler: HandlerRef<P>,
        ctx: Arc<ConnectionContext>,
        bus: Bus,
    ) -> Self {
        Self {
            event,
            handler,
            ctx,
            bus,
        }
    }

    /// Runs until the queue yields `Terminate` or closes.
    pub(crate) async fn run(self, mut queue: QueueRx<P>) -> WorkerExit {
        let mut handled: u64 = 0;

        let exit = loop {
            match queue.recv().await {
                Some(DispatchItem::Message { event, payload }) => {
                    trace!(event = %event, "dispatching");
                    self.invoke(payload).await;
                    handled += 1;
                }
                Some(DispatchItem::Terminate) => break WorkerExit::Terminated,
                None => break WorkerExit::Disconnected,
            }
        };

        self.bus.publish(
            Event::new(EventKind::WorkerStopped)
                .with_connection(self.ctx.id().as_arc())
                .with_event_name(self.event.clone())
                .with_handled(handled),
        );
        exit
    }

    /// One handler invocation with failure isolation.
    async fn invoke(&self, payload: P) {
        let ctx = Arc::clone(&self.ctx);
        // Building the future inside the async block so a panic in a
        // closure-backed handler's synchronous prefix is caught as well.
        let call = async { self.handler.call(ctx, payload).await };

        match std::panic::AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if e.is_severe() {
                    error!(event = %self.event, handler = self.handler.name(), error = %e, "handler failed");
                } else {
                    warn!(event = %self.event, handler = self.handler.name(), error = %e, "handler failed");
                }
                self.publish(EventKind::HandlerFailed, e.to_string());
            }
            Err(panic_err) => {
                let info = panic_message(panic_err.as_ref());
                error!(event = %self.event, handler = self.handler.name(), panic = %info, "handler panicked");
                self.publish(EventKind::HandlerPanicked, info);
            }
        }
    }

    fn publish(&self, kind: EventKind, reason: String) {
        self.bus.publish(
            Event::new(kind)
                .with_connection(self.ctx.id().as_arc())
                .with_event_name(self.event.clone())
                .with_reason(reason),
        );
    }
}
