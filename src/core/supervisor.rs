//! # ConnectionSupervisor: owns one connection's queue/worker topology.
//!
//! ## High-level architecture
//! ```text
//! accept(transport, ambient)
//!   │
//!   ├─► ConnectionContext::new(ambient, transport.outbound(), root.child_token())
//!   │
//!   ├─► for each route (event, handler):
//!   │      queue()  ──► QueueTx ─┐
//!   │                 QueueRx ───┼──► workers.spawn(EventWorker::run(rx))
//!   │                            │
//!   ├─► receivers.spawn(ReceiveLoop::run(transport, codec, {event → QueueTx}))
//!   │
//!   ├─► wait: ReceiveLoop exits (close / error / cancel) ─► Terminate broadcast
//!   │
//!   └─► wait_workers_with_grace(cfg.grace):
//!          ├─ Ok (all joined)  → ConnectionClosed, Ok(CloseReason)
//!          └─ Timeout exceeded → abort + join remaining, GraceExceeded,
//!                                Err(DispatchError::GraceExceeded)
//! ```
//!
//! ## Rules
//! - Every unit lives in a `JoinSet`; dropping the `accept` future aborts them all
//! - Panics in workers and in the receive loop are caught at the task boundary
//! - On return no task of this connection is alive and every queue is dropped

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::codec::Codec;
use crate::core::config::DispatcherConfig;
use crate::connection::{Ambient, ConnectionContext};
use crate::core::panic_message;
use crate::core::queue::queue;
use crate::core::receiver::{CloseReason, ReceiveLoop};
use crate::core::worker::EventWorker;
use crate::error::DispatchError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerRef;
use crate::transport::Transport;

/// Frozen route table: event name → handler.
pub(crate) type Routes<P> = HashMap<Arc<str>, HandlerRef<P>>;

/// Borrowed view of the dispatcher state needed to run one connection.
pub(crate) struct ConnectionSupervisor<'a, C: Codec> {
    pub(crate) codec: &'a Arc<C>,
    pub(crate) routes: &'a Routes<C::Payload>,
    pub(crate) cfg: &'a DispatcherConfig,
    pub(crate) bus: &'a Bus,
}

impl<C: Codec> ConnectionSupervisor<'_, C> {
    /// Builds the topology, runs it, and tears it down completely.
    pub(crate) async fn run<T: Transport>(
        &self,
        transport: T,
        ambient: Ambient,
        root: &CancellationToken,
    ) -> Result<CloseReason, DispatchError> {
        let cancel = root.child_token();
        let ctx = Arc::new(ConnectionContext::new(
            ambient,
            transport.outbound(),
            cancel.clone(),
        ));
        let span = info_span!("connection", id = %ctx.id());

        let res = self
            .drive(transport, Arc::clone(&ctx), &cancel, root, span.clone())
            .instrument(span)
            .await;
        // Handlers holding on to the context see the connection as closing.
        cancel.cancel();
        res
    }

    async fn drive<T: Transport>(
        &self,
        transport: T,
        ctx: Arc<ConnectionContext>,
        cancel: &CancellationToken,
        root: &CancellationToken,
        span: tracing::Span,
    ) -> Result<CloseReason, DispatchError> {
        let conn = ctx.id().as_arc();

        let mut workers: JoinSet<Arc<str>> = JoinSet::new();
        let mut queues = HashMap::with_capacity(self.routes.len());
        for (event, handler) in self.routes {
            let (tx, rx) = queue(self.cfg.queue_bound());
            let _ = queues.insert(Arc::clone(event), tx);

            let worker = EventWorker::new(
                Arc::clone(event),
                Arc::clone(handler),
                Arc::clone(&ctx),
                self.bus.clone(),
            );
            let name = Arc::clone(event);
            let _ = workers.spawn(
                async move {
                    // Handler panics are caught per invocation; this only guards the loop itself.
                    match std::panic::AssertUnwindSafe(worker.run(rx))
                        .catch_unwind()
                        .await
                    {
                        Ok(exit) => debug!(event = %name, exit = ?exit, "worker finished"),
                        Err(panic_err) => error!(
                            event = %name,
                            panic = %panic_message(panic_err.as_ref()),
                            "worker loop panicked"
                        ),
                    }
                    name
                }
                .instrument(span.clone()),
            );
        }

        info!(
            identity = ctx.ambient().identity().unwrap_or("-"),
            events = self.routes.len(),
            "connection opened"
        );
        self.bus
            .publish(Event::new(EventKind::ConnectionOpened).with_connection(Arc::clone(&conn)));

        let receiver = ReceiveLoop::new(
            transport,
            Arc::clone(self.codec),
            queues,
            Arc::clone(&conn),
            self.bus.clone(),
            cancel.clone(),
            root.clone(),
        );
        let mut receivers: JoinSet<CloseReason> = JoinSet::new();
        let _ = receivers.spawn(
            async move {
                match std::panic::AssertUnwindSafe(receiver.run())
                    .catch_unwind()
                    .await
                {
                    Ok(reason) => reason,
                    Err(panic_err) => CloseReason::Faulted {
                        info: panic_message(panic_err.as_ref()),
                    },
                }
            }
            .instrument(span),
        );

        let reason = match receivers.join_next().await {
            Some(Ok(reason)) => reason,
            Some(Err(join_err)) => CloseReason::Faulted {
                info: join_err.to_string(),
            },
            None => CloseReason::Faulted {
                info: "receive loop missing".into(),
            },
        };

        let res = self.wait_workers_with_grace(&mut workers, &conn).await;

        info!(reason = %reason, "connection closed");
        self.bus.publish(
            Event::new(EventKind::ConnectionClosed)
                .with_connection(conn)
                .with_reason(reason.to_string()),
        );
        res.map(|()| reason)
    }

    /// Joins every worker within the grace period; aborts the rest.
    async fn wait_workers_with_grace(
        &self,
        workers: &mut JoinSet<Arc<str>>,
        conn: &Arc<str>,
    ) -> Result<(), DispatchError> {
        let grace = self.cfg.grace;
        let mut pending: HashSet<Arc<str>> = self.routes.keys().cloned().collect();

        let done = async {
            while let Some(res) = workers.join_next().await {
                if let Ok(name) = res {
                    let _ = pending.remove(&name);
                }
            }
        };
        if time::timeout(grace, done).await.is_ok() {
            return Ok(());
        }

        workers.shutdown().await;
        let mut stuck: Vec<String> = pending.iter().map(|s| s.to_string()).collect();
        stuck.sort();

        warn!(grace = ?grace, stuck = ?stuck, "workers exceeded grace period; aborted");
        self.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_connection(Arc::clone(conn))
                .with_reason(stuck.join(",")),
        );
        Err(DispatchError::GraceExceeded {
            connection: conn.to_string(),
            grace,
            stuck,
        })
    }
}
