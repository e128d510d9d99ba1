//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for observing dispatcher runtime events
//! (decode failures, handler panics, connection lifecycle). Each subscriber is
//! driven by a dedicated worker loop fed by a bounded queue owned by the
//! dispatcher.
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) – they do **not** block the
//!   receive loop, event workers, nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped** and `SubscriberOverflow` is published.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use evdispatch::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct PanicCounter(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for PanicCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::HandlerPanicked {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "panic-counter" }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for runtime event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
