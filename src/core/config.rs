//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`], the settings shared by every connection a
//! [`Dispatcher`](crate::Dispatcher) serves.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → unbounded event queues (no backpressure, no drops)
//! - `bus_capacity` is clamped to a minimum of 1

use std::time::Duration;

/// Global configuration for the dispatcher.
///
/// ## Field semantics
/// - `grace`: how long workers may keep draining after termination was broadcast
/// - `queue_capacity`: per-event queue bound (`0` = unbounded)
/// - `bus_capacity`: runtime event bus ring buffer size
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum time to wait for event workers once the receive loop has ended.
    ///
    /// Workers still running afterwards are aborted and the connection returns
    /// `DispatchError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of each per-event queue.
    ///
    /// - `0` = unbounded. A slow handler lets its queue grow without limit.
    /// - `n > 0` = at most `n` pending messages per event; further messages for
    ///   that event are dropped and reported as `QueueOverflow`.
    pub queue_capacity: usize,

    /// Capacity of the runtime event bus broadcast channel.
    pub bus_capacity: usize,
}

impl DispatcherConfig {
    /// Returns the per-event queue bound as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → bounded to `n`
    #[inline]
    pub fn queue_bound(&self) -> Option<usize> {
        if self.queue_capacity == 0 {
            None
        } else {
            Some(self.queue_capacity)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `queue_capacity = 0` (unbounded)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            queue_capacity: 0,
            bus_capacity: 1024,
        }
    }
}
