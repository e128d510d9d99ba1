//! # Dispatcher: the shared entry point for connections.
//!
//! A [`Dispatcher`] is built once (see [`DispatcherBuilder`]) and cloned freely;
//! every clone serves connections from the same frozen route table, bus and
//! shutdown token.
//!
//! ```text
//! Dispatcher ──accept(transport, ambient)──► ConnectionSupervisor ──► CloseReason
//!     │
//!     ├── shutdown()            cancels the root token; every live connection
//!     │                         sees CloseReason::Shutdown, new accepts fail
//!     ├── shutdown_on_signal()  same, on SIGINT/SIGTERM/SIGQUIT (Ctrl-C on Windows)
//!     ├── subscribe()           raw runtime events (Bus)
//!     └── close_subscribers()   flush pending events to subscribers, then stop them
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::builder::DispatcherBuilder;
use super::config::DispatcherConfig;
use super::receiver::CloseReason;
use super::shutdown;
use super::supervisor::{ConnectionSupervisor, Routes};
use crate::codec::Codec;
use crate::connection::Ambient;
use crate::error::DispatchError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::transport::Transport;

struct Inner<C: Codec> {
    codec: Arc<C>,
    routes: Routes<C::Payload>,
    cfg: DispatcherConfig,
    bus: Bus,
    root: CancellationToken,
    subscribers: Option<Arc<SubscriberSet>>,
    active: AtomicUsize,
}

impl<C: Codec> Drop for Inner<C> {
    fn drop(&mut self) {
        if let Some(set) = &self.subscribers {
            set.stop();
        }
    }
}

/// Serves connections against a frozen set of event handlers.
pub struct Dispatcher<C: Codec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> Dispatcher<C> {
    /// Starts building a dispatcher around `codec`.
    pub fn builder(codec: C) -> DispatcherBuilder<C> {
        DispatcherBuilder::new(codec)
    }

    pub(crate) fn new_internal(
        codec: Arc<C>,
        routes: Routes<C::Payload>,
        cfg: DispatcherConfig,
        bus: Bus,
        subscribers: Option<Arc<SubscriberSet>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                codec,
                routes,
                cfg,
                bus,
                root: CancellationToken::new(),
                subscribers,
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Serves one connection until it ends.
    ///
    /// Spawns one worker per registered event and a receive loop, then waits for
    /// all of them. When this returns (or the future is dropped) nothing of the
    /// connection keeps running.
    ///
    /// # Errors
    /// - [`DispatchError::ShutDown`] if [`shutdown`](Self::shutdown) was already called;
    /// - [`DispatchError::GraceExceeded`] if workers outlived the grace period and were aborted.
    pub async fn accept<T: Transport>(
        &self,
        transport: T,
        ambient: Ambient,
    ) -> Result<CloseReason, DispatchError> {
        if self.inner.root.is_cancelled() {
            return Err(DispatchError::ShutDown);
        }
        let _active = ActiveGuard::enter(&self.inner.active);

        let supervisor = ConnectionSupervisor {
            codec: &self.inner.codec,
            routes: &self.inner.routes,
            cfg: &self.inner.cfg,
            bus: &self.inner.bus,
        };
        supervisor.run(transport, ambient, &self.inner.root).await
    }

    /// Ends every live connection and rejects new ones. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.root.is_cancelled() {
            return;
        }
        info!(
            active = self.active_connections(),
            "dispatcher shutdown requested"
        );
        self.inner
            .bus
            .publish(Event::new(EventKind::ShutdownRequested));
        self.inner.root.cancel();
    }

    /// Waits for an OS termination signal, then calls [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    /// Returns the error from signal registration.
    pub async fn shutdown_on_signal(&self) -> std::io::Result<()> {
        shutdown::wait_for_shutdown_signal().await?;
        info!("termination signal received");
        self.shutdown();
        Ok(())
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// Number of connections currently inside [`accept`](Self::accept).
    pub fn active_connections(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Registered event names, sorted.
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.routes.keys().map(|k| k.as_ref()).collect();
        names.sort_unstable();
        names
    }

    /// Subscribes to raw runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Delivers every runtime event published so far to the registered
    /// subscribers, then stops their workers. Idempotent.
    ///
    /// Call it last: later events only reach [`subscribe`](Self::subscribe) receivers.
    pub async fn close_subscribers(&self) {
        if let Some(set) = &self.inner.subscribers {
            set.shutdown().await;
        }
    }

    /// The configuration this dispatcher was built with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.cfg
    }
}

/// Counts a connection for as long as its `accept` future lives.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
