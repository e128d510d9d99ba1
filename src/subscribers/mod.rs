//! # Runtime event subscribers.
//!
//! ```text
//! Receive loop / workers ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                  ├──► sub1.on_event()
//!                                                                  └──► subN.on_event()
//! ```
//!
//! A stdout [`LogWriter`] ships behind the `logging` feature.
//!
//! Register subscribers with
//! [`DispatcherBuilder::with_subscribers`](crate::DispatcherBuilder::with_subscribers).

mod subscribe;
mod subscriber_set;

pub use subscribe::Subscribe;
pub(crate) use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
