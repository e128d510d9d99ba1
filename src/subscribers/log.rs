//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints runtime events to stdout, one line each.
//!
//! ## Output format
//! ```text
//! [opened] conn=3f2a…
//! [decode-failed] conn=3f2a… reason="expected value at line 1 column 1"
//! [handler-failed] conn=3f2a… event=chat reason="handler failed: boom"
//! [worker-stopped] conn=3f2a… event=chat handled=3
//! [closed] conn=3f2a… reason=closed
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Stdout logging subscriber. Enabled via the `logging` feature.
///
/// Not intended for production use; implement [`Subscribe`] for structured
/// logging or metrics.
pub struct LogWriter;

impl LogWriter {
    fn line(e: &Event) -> String {
        let tag = match e.kind {
            EventKind::ConnectionOpened => "opened",
            EventKind::ConnectionClosed => "closed",
            EventKind::GraceExceeded => "grace-exceeded",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::DecodeFailed => "decode-failed",
            EventKind::EventUnrouted => "unrouted",
            EventKind::QueueOverflow => "queue-overflow",
            EventKind::HandlerFailed => "handler-failed",
            EventKind::HandlerPanicked => "handler-panicked",
            EventKind::WorkerStopped => "worker-stopped",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        };

        let mut out = format!("[{tag}]");
        if let Some(conn) = &e.connection {
            out.push_str(&format!(" conn={conn}"));
        }
        if let Some(name) = &e.event_name {
            out.push_str(&format!(" event={name}"));
        }
        if let Some(handled) = e.handled {
            out.push_str(&format!(" handled={handled}"));
        }
        if let Some(reason) = &e.reason {
            out.push_str(&format!(" reason={reason:?}"));
        }
        out
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("{}", Self::line(e));
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
