//! # Runtime events emitted by the dispatcher.
//!
//! The [`EventKind`] enum classifies what happened inside a connection topology:
//! - **Connection events**: opened, closed, grace exceeded, shutdown requested
//! - **Routing events**: decode failures, unrouted events, queue overflow
//! - **Worker events**: handler failures and panics, worker exit
//! - **Subscriber events**: panics and overflow inside subscriber workers
//!
//! Not to be confused with application events: those are the routing keys
//! produced by the [`Codec`](crate::Codec). A runtime [`Event`] refers to one by
//! [`Event::event_name`].
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use evdispatch::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::HandlerFailed)
//!     .with_connection("c0ffee")
//!     .with_event_name("chat")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::HandlerFailed);
//! assert_eq!(ev.event_name.as_deref(), Some("chat"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Connection events ===
    /// Topology for a connection is up.
    ///
    /// Sets: `connection`
    ConnectionOpened,

    /// Receive loop ended and every worker has been joined.
    ///
    /// Sets: `connection`, `reason` (close reason)
    ConnectionClosed,

    /// Workers outlived the grace period and were aborted.
    ///
    /// Sets: `connection`, `reason` (stuck events)
    GraceExceeded,

    /// [`Dispatcher::shutdown`](crate::Dispatcher::shutdown) was called.
    ShutdownRequested,

    // === Routing events ===
    /// A frame could not be decoded; it was dropped.
    ///
    /// Sets: `connection`, `reason`
    DecodeFailed,

    /// A decoded event has no registered handler; it was dropped.
    ///
    /// Sets: `connection`, `event_name`
    EventUnrouted,

    /// A bounded event queue was full; the message was dropped for that event only.
    ///
    /// Sets: `connection`, `event_name`
    QueueOverflow,

    // === Worker events ===
    /// A handler returned an error. The worker continues.
    ///
    /// Sets: `connection`, `event_name`, `reason`
    HandlerFailed,

    /// A handler panicked. The worker continues.
    ///
    /// Sets: `connection`, `event_name`, `reason` (panic message)
    HandlerPanicked,

    /// An event worker exited.
    ///
    /// Sets: `connection`, `event_name`, `handled`
    WorkerStopped,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `event_name` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `event_name` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Connection identifier, if applicable.
    pub connection: Option<Arc<str>>,
    /// Application event name (or subscriber name for subscriber events).
    pub event_name: Option<Arc<str>>,
    /// Human-readable reason (errors, close reason, panic message).
    pub reason: Option<Arc<str>>,
    /// Number of messages a worker handled before stopping.
    pub handled: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            connection: None,
            event_name: None,
            reason: None,
            handled: None,
        }
    }

    /// Attaches a connection identifier.
    #[inline]
    pub fn with_connection(mut self, id: impl Into<Arc<str>>) -> Self {
        self.connection = Some(id.into());
        self
    }

    /// Attaches an application event name.
    #[inline]
    pub fn with_event_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a handled-message count.
    #[inline]
    pub fn with_handled(mut self, n: u64) -> Self {
        self.handled = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_event_name(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_event_name(subscriber)
            .with_reason(info)
    }
}
