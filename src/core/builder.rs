//! # Builder for [`Dispatcher`].
//!
//! Registration happens here and only here: once [`build`](DispatcherBuilder::build)
//! returns, the route table is frozen and shared by every connection.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;
use super::supervisor::Routes;
use crate::codec::Codec;
use crate::connection::ConnectionContext;
use crate::error::{BuildError, HandlerError};
use crate::events::Bus;
use crate::handlers::{HandlerFn, HandlerRef};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Collects the codec, routes, subscribers and configuration of a dispatcher.
pub struct DispatcherBuilder<C: Codec> {
    codec: C,
    cfg: DispatcherConfig,
    routes: Vec<(String, HandlerRef<C::Payload>)>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<C: Codec> DispatcherBuilder<C> {
    /// Creates a builder with default configuration and no routes.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            cfg: DispatcherConfig::default(),
            routes: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: DispatcherConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Registers `handler` for `event`.
    pub fn on(mut self, event: impl Into<String>, handler: HandlerRef<C::Payload>) -> Self {
        self.routes.push((event.into(), handler));
        self
    }

    /// Registers a closure for `event`; the handler is named after the event.
    pub fn on_fn<F, Fut>(self, event: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<ConnectionContext>, C::Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let event = event.into();
        let handler: HandlerRef<C::Payload> = HandlerFn::arc(event.clone(), f);
        self.on(event, handler)
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (connection lifecycle, failures, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the registrations and freezes them into a [`Dispatcher`].
    ///
    /// Spawns subscriber workers when any subscriber is set, so in that case it
    /// must be called from within a Tokio runtime.
    pub fn build(self) -> Result<Dispatcher<C>, BuildError> {
        let mut routes: Routes<C::Payload> = HashMap::with_capacity(self.routes.len());
        for (event, handler) in self.routes {
            if event.is_empty() {
                return Err(BuildError::EmptyEventName);
            }
            if routes.contains_key(event.as_str()) {
                return Err(BuildError::DuplicateEvent(event));
            }
            let _ = routes.insert(Arc::from(event), handler);
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subscribers = (!self.subscribers.is_empty()).then(|| {
            let set = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
            set.spawn_listener(bus.subscribe());
            set
        });

        Ok(Dispatcher::new_internal(
            Arc::new(self.codec),
            routes,
            self.cfg,
            bus,
            subscribers,
        ))
    }
}
