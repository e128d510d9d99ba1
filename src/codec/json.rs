//! JSON envelope codec.
//!
//! Accepted shapes (text or binary frames):
//! ```text
//! {"event": "chat", "data": {...}}     data optional, defaults to null
//! ["chat", {...}]                       second element optional
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::Codec;
use crate::error::DecodeError;
use crate::transport::Frame;

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Object {
        event: String,
        #[serde(default)]
        data: Value,
    },
    Tuple(String, Value),
    Bare((String,)),
}

/// Decodes JSON envelopes into `serde_json::Value` payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Construct a new [`JsonCodec`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    type Payload = Value;

    fn decode(&self, frame: &Frame) -> Result<(String, Value), DecodeError> {
        let envelope: Envelope = serde_json::from_slice(frame.as_bytes())
            .map_err(|e| DecodeError::new(format!("invalid envelope: {e}")))?;

        let (event, data) = match envelope {
            Envelope::Object { event, data } => (event, data),
            Envelope::Tuple(event, data) => (event, data),
            Envelope::Bare((event,)) => (event, Value::Null),
        };
        if event.is_empty() {
            return Err(DecodeError::new("empty event name"));
        }
        Ok((event, data))
    }
}
