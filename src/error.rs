//! Error types used by the dispatcher, handlers, codecs and transports.
//!
//! - [`DispatchError`]: errors returned by [`Dispatcher::accept`](crate::Dispatcher::accept).
//! - [`BuildError`]: registration mistakes caught by the builder.
//! - [`HandlerError`]: failures raised by a registered handler.
//! - [`DecodeError`]: a frame the codec could not classify.
//! - [`TransportError`]: receive/send failures of the underlying connection.
//!
//! Every type provides `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while serving a connection.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The dispatcher was shut down before the connection was accepted.
    #[error("dispatcher is shut down")]
    ShutDown,

    /// Workers did not finish within the grace period after termination was broadcast;
    /// they were aborted.
    #[error("connection {connection}: grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// Connection whose workers were aborted.
        connection: String,
        /// The configured grace duration.
        grace: Duration,
        /// Names of the events whose workers were still running.
        stuck: Vec<String>,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evdispatch::DispatchError;
    /// use std::time::Duration;
    ///
    /// let err = DispatchError::GraceExceeded {
    ///     connection: "c1".into(),
    ///     grace: Duration::from_secs(1),
    ///     stuck: vec![],
    /// };
    /// assert_eq!(err.as_label(), "dispatch_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::ShutDown => "dispatch_shut_down",
            DispatchError::GraceExceeded { .. } => "dispatch_grace_exceeded",
        }
    }
}

/// # Registration errors reported by [`DispatcherBuilder::build`](crate::DispatcherBuilder::build).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Two handlers were registered under the same event name.
    #[error("handler for event {0:?} registered twice")]
    DuplicateEvent(String),

    /// A handler was registered under an empty event name.
    #[error("event name must not be empty")]
    EmptyEventName,
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::DuplicateEvent(_) => "build_duplicate_event",
            BuildError::EmptyEventName => "build_empty_event_name",
        }
    }
}

/// # Errors raised by a handler invocation.
///
/// Neither variant stops the worker; the distinction only affects log severity.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The invocation failed; the next message is handled normally.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Same as [`Fail`](HandlerError::Fail), logged at `error` level instead of `warn`.
    #[error("handler failed (severe): {error}")]
    Severe {
        /// The underlying error message.
        error: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`HandlerError::Severe`].
    pub fn severe(error: impl Into<String>) -> Self {
        HandlerError::Severe {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evdispatch::HandlerError;
    ///
    /// assert_eq!(HandlerError::fail("boom").as_label(), "handler_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Severe { .. } => "handler_severe",
        }
    }

    /// True for [`HandlerError::Severe`].
    pub fn is_severe(&self) -> bool {
        matches!(self, HandlerError::Severe { .. })
    }
}

/// A frame the codec could not turn into `(event, payload)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unparsable frame: {reason}")]
pub struct DecodeError {
    /// Why the frame was rejected.
    pub reason: String,
}

impl DecodeError {
    /// Creates a decode error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "decode_failed"
    }
}

/// # Transport failures.
///
/// Any of these ends the connection; the dispatcher never retries.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer or the local side has gone away.
    #[error("transport closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol-level violation reported by the transport (bad framing, etc.).
    #[error("transport protocol error: {error}")]
    Protocol {
        /// The underlying error message.
        error: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Closed => "transport_closed",
            TransportError::Io(_) => "transport_io",
            TransportError::Protocol { .. } => "transport_protocol",
        }
    }
}
