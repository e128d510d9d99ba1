//! # evdispatch
//!
//! **evdispatch** routes the messages of long-lived connections (websockets and
//! the like) to per-event handlers.
//!
//! Every accepted connection gets one receive loop and, for each registered
//! event, one dedicated queue and worker. Messages for the same event are handled
//! strictly in arrival order; different events never wait for each other.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!               Dispatcher::builder(codec).on("a", h_a).on("b", h_b).build()
//!                                      │ (frozen route table)
//!                                      ▼
//!  transport ──► accept(transport, ambient)
//!                                      │
//! ┌────────────────────────────────────▼──────────────────────────────────┐
//! │ ConnectionSupervisor (one per connection)                             │
//! │   ConnectionContext { id, ambient, send(), close() }                  │
//! └──────┬───────────────────────────────────────────────────────┬────────┘
//!        ▼                                                       │
//! ┌──────────────┐  decode   ┌──────────┐    ┌──────────────┐    │
//! │ ReceiveLoop  │──────────►│ queue a  │───►│ worker a     │──► h_a(ctx, payload)
//! │ (transport,  │           └──────────┘    └──────────────┘    │
//! │  codec)      │           ┌──────────┐    ┌──────────────┐    │
//! │              │──────────►│ queue b  │───►│ worker b     │──► h_b(ctx, payload)
//! └──────┬───────┘           └──────────┘    └──────────────┘    │
//!        │ close / error / cancel: Terminate to every queue      │
//!        ▼                                                       ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                        │
//! │              (capacity: DispatcherConfig::bus_capacity)               │
//! └──────────────────────────────────┬────────────────────────────────────┘
//!                                    ▼
//!                         SubscriberSet (per-sub queues)
//! ```
//!
//! ### Lifecycle
//! ```text
//! accept ──► spawn workers ──► spawn receive loop ──► ConnectionOpened
//!
//! receive loop {
//!   frame ──► codec.decode ──┬─ error/panic ─► DecodeFailed (frame dropped)
//!                            ├─ no route    ─► EventUnrouted (frame dropped)
//!                            └─ route       ─► queue.push
//! } until transport closed/failed, ctx.close(), or dispatcher.shutdown()
//!
//! Terminate ──► workers drain their queue and exit
//!           ──► wait up to DispatcherConfig::grace, abort stragglers
//!           ──► ConnectionClosed, accept returns
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**      | Route decoded events to per-event, per-connection workers.    | [`Dispatcher`], [`DispatcherBuilder`]       |
//! | **Handlers**      | Async handlers as trait objects or closures.                  | [`Handler`], [`HandlerFn`], [`HandlerRef`]  |
//! | **Codecs**        | Classify raw frames into `(event, payload)`.                  | [`Codec`], [`FnCodec`], [`JsonCodec`]       |
//! | **Transport**     | Narrow receive/send boundary; in-memory pair included.        | [`Transport`], [`Outbound`], [`Frame`]      |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).         | [`Subscribe`], [`Event`], [`EventKind`]     |
//! | **Errors**        | Typed errors for each boundary.                               | [`DispatchError`], [`HandlerError`]         |
//! | **Configuration** | Grace period, queue bounds, bus capacity.                     | [`DispatcherConfig`]                        |
//!
//! ## Optional features
//! - `json` (default): [`JsonCodec`] for `{"event": .., "data": ..}` envelopes.
//! - `logging`: exports a simple stdout `LogWriter` subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use evdispatch::{Ambient, ConnectionContext, DecodeError, Dispatcher, FnCodec, Frame, HandlerError, transport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // "event:payload"
//!     let codec = FnCodec::new(|frame: &Frame| -> Result<(String, String), DecodeError> {
//!         let text = frame.as_text().ok_or_else(|| DecodeError::new("binary frame"))?;
//!         let (event, rest) = text.split_once(':').ok_or_else(|| DecodeError::new("no separator"))?;
//!         Ok((event.to_string(), rest.to_string()))
//!     });
//!
//!     let dispatcher = Dispatcher::builder(codec)
//!         .on_fn("echo", |ctx: Arc<ConnectionContext>, text: String| async move {
//!             ctx.send(Frame::text(text)).await.map_err(|e| HandlerError::fail(e.to_string()))?;
//!             Ok::<(), HandlerError>(())
//!         })
//!         .build()?;
//!
//!     let (conn, mut peer) = transport::channel();
//!     peer.send_text("echo:hello");
//!     peer.close();
//!
//!     let reason = dispatcher.accept(conn, Ambient::new()).await?;
//!     assert_eq!(reason, evdispatch::CloseReason::Closed);
//!     assert_eq!(peer.recv().await, Some(Frame::text("hello")));
//!     Ok(())
//! }
//! ```
mod codec;
mod connection;
mod core;
mod error;
mod events;
mod handlers;
mod subscribers;

pub mod transport;

// ---- Public re-exports ----

pub use codec::{Codec, FnCodec};
pub use connection::{Ambient, ConnectionContext, ConnectionId};
pub use core::{CloseReason, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::{BuildError, DecodeError, DispatchError, HandlerError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{BoxHandlerFuture, Handler, HandlerFn, HandlerRef};
pub use subscribers::Subscribe;
pub use transport::{Frame, Outbound, Transport};

// Optional: built-in JSON codec.
// Enabled by default; disable with `default-features = false`.
#[cfg(feature = "json")]
pub use codec::JsonCodec;

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
