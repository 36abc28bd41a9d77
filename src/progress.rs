//! Progress-sink seam between the pipeline and its caller's transport.
//!
//! The pipeline reports three kinds of events per processed document:
//! ordered human-readable notices (with a severity marker), exactly one
//! final structured payload, and one closing status object. How those reach
//! the end user — a WebSocket, a terminal, a log — is the host's business,
//! so the seam is a trait with no-op defaults.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: hosts can
//! forward events into a Tokio channel (see [`ChannelProgressSink`]), a
//! duplex socket, or stdout without the library knowing anything about how
//! the application communicates. Methods are synchronous so implementations
//! stay trivially `Send + Sync`; async hosts bridge through a channel.

use crate::persist::StoredResult;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Severity marker attached to every progress notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// The closing `{message, type, finished}` object sent once per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
    #[serde(rename = "type")]
    pub level: NoticeLevel,
    pub finished: bool,
}

/// Wire shape of the final structured payload: `{"result": {"text": …}}`.
#[derive(Debug, Clone, Serialize)]
pub struct FinalPayload<'a> {
    pub result: ResultText<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultText<'a> {
    pub text: &'a StoredResult,
}

impl<'a> FinalPayload<'a> {
    pub fn new(stored: &'a StoredResult) -> Self {
        Self {
            result: ResultText { text: stored },
        }
    }
}

/// Receives pipeline events for one processed document.
///
/// All methods have default no-op implementations so hosts only override
/// what they forward. Implementations must be `Send + Sync`; the pipeline
/// itself calls them from a single sequential task.
pub trait ProgressSink: Send + Sync {
    /// A human-readable progress notice with a severity marker.
    fn notice(&self, level: NoticeLevel, message: &str) {
        let _ = (level, message);
    }

    /// The final structured payload. Sent at most once per document.
    fn result(&self, stored: &StoredResult) {
        let _ = stored;
    }

    /// The closing status object. Sent exactly once per document.
    fn status(&self, status: &StatusMessage) {
        let _ = status;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {}

/// One event as seen by a channel-bridged host.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Notice {
        level: NoticeLevel,
        message: String,
    },
    Result(Box<StoredResult>),
    Status(StatusMessage),
}

/// Bridges sink callbacks into an unbounded Tokio channel.
///
/// The natural fit for duplex-socket hosts: the request handler owns the
/// receiving end and forwards each event to the client in order. A closed
/// receiver (client went away) is ignored — the pipeline finishes the
/// in-flight document regardless.
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn notice(&self, level: NoticeLevel, message: &str) {
        let _ = self.tx.send(TransportEvent::Notice {
            level,
            message: message.to_string(),
        });
    }

    fn result(&self, stored: &StoredResult) {
        let _ = self
            .tx
            .send(TransportEvent::Result(Box::new(stored.clone())));
    }

    fn status(&self, status: &StatusMessage) {
        let _ = self.tx.send(TransportEvent::Status(status.clone()));
    }
}
