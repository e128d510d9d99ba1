//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ## Architecture
//! ```text
//! Bus ──► listener ──► emit(event)
//!                        │
//!                        ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!                        │    (bounded)         └──────► panic → SubscriberPanicked
//!                        ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!                        └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: slow/panicking subscriber doesn't affect others
//! - **No feedback**: failures while handling `SubscriberOverflow`/`SubscriberPanicked`
//!   are logged, never re-published
//! - **Per-subscriber FIFO**

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for the subscribers registered on a dispatcher.
pub(crate) struct SubscriberSet {
    channels: Mutex<Vec<SubscriberChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    stop: CancellationToken,
    bus: Bus,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_subscriber_evt(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
    )
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub(crate) fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_message(panic_err.as_ref());
                        warn!(subscriber = sub.name(), info = %info, event = ?ev.kind, "subscriber panicked");
                        if !is_subscriber_evt(ev.kind) {
                            bus_for_worker.publish(Event::subscriber_panicked(sub.name(), info));
                        }
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
            listener: Mutex::new(None),
            stop: CancellationToken::new(),
            bus,
        }
    }

    /// Emits a pre-allocated `Arc<Event>` to all subscribers.
    ///
    /// Overflow of subscriber events is not re-published.
    pub(crate) fn emit_arc(&self, event: Arc<Event>) {
        let quiet = is_subscriber_evt(event.kind);

        for channel in lock(&self.channels).iter() {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if quiet {
                warn!(subscriber = channel.name, reason, "subscriber event dropped");
            } else {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Forwards every bus event into this set until [`stop`](Self::stop) or
    /// [`shutdown`](Self::shutdown) is called, or the bus closes.
    ///
    /// Lagged receivers skip the missed events and keep going. On stop, events
    /// already buffered in `rx` are still forwarded.
    pub(crate) fn spawn_listener(self: &Arc<Self>, mut rx: broadcast::Receiver<Event>) {
        let set = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = set.stop.cancelled() => break,
                    next = rx.recv() => next,
                };
                match next {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::TryRecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(_) => break,
                }
            }
        });
        *lock(&self.listener) = Some(handle);
    }

    /// Stops the listener without waiting for it.
    pub(crate) fn stop(&self) {
        self.stop.cancel();
    }

    /// Delivers every event already on the bus, then stops all subscriber workers.
    ///
    /// Idempotent. Events published afterwards no longer reach the subscribers.
    pub(crate) async fn shutdown(&self) {
        self.stop.cancel();
        let listener = lock(&self.listener).take();
        if let Some(h) = listener {
            let _ = h.await;
        }

        drop(std::mem::take(&mut *lock(&self.channels)));
        let workers = std::mem::take(&mut *lock(&self.workers));
        for h in workers {
            let _ = h.await;
        }
    }
}
