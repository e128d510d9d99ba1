//! # Frame codecs.
//!
//! A [`Codec`] classifies a raw [`Frame`] into `(event, payload)`. It is a pure
//! function from the dispatcher's point of view: it is called from the receive
//! loop, must not block, and its failures (errors **or** panics) only drop the
//! frame in question.
//!
//! Shipped implementations:
//! - [`FnCodec`]: wraps any `Fn(&Frame) -> Result<(String, P), DecodeError>`;
//! - [`JsonCodec`]: JSON envelopes (feature `json`).

#[cfg(feature = "json")]
mod json;

#[cfg(feature = "json")]
pub use json::JsonCodec;

use crate::error::DecodeError;
use crate::transport::Frame;

/// Turns a raw frame into an event name and a payload.
pub trait Codec: Send + Sync + 'static {
    /// Payload handed to handlers.
    type Payload: Send + 'static;

    /// Decodes one frame.
    fn decode(&self, frame: &Frame) -> Result<(String, Self::Payload), DecodeError>;
}

/// Closure-backed codec.
///
/// ```rust
/// use evdispatch::{DecodeError, FnCodec, Frame, Codec};
///
/// // "event:payload"
/// let codec = FnCodec::new(|frame: &Frame| -> Result<(String, String), DecodeError> {
///     let text = frame.as_text().ok_or_else(|| DecodeError::new("binary frame"))?;
///     let (event, rest) = text.split_once(':').ok_or_else(|| DecodeError::new("no separator"))?;
///     Ok((event.to_string(), rest.to_string()))
/// });
///
/// let (event, payload) = codec.decode(&Frame::text("chat:hi")).unwrap();
/// assert_eq!((event.as_str(), payload.as_str()), ("chat", "hi"));
/// ```
pub struct FnCodec<F> {
    f: F,
}

impl<F> FnCodec<F> {
    /// Wraps a decoding closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, P> Codec for FnCodec<F>
where
    F: Fn(&Frame) -> Result<(String, P), DecodeError> + Send + Sync + 'static,
    P: Send + 'static,
{
    type Payload = P;

    fn decode(&self, frame: &Frame) -> Result<(String, P), DecodeError> {
        (self.f)(frame)
    }
}
