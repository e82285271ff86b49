use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Kind of a diagnostic emitted by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    PublishEncodeError,
    PublishSendError,
    SubscribeDecodeError,
    SubscriptionClosed,
    HistoryAppendError,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublishEncodeError => "publish-encode-error",
            Self::PublishSendError => "publish-send-error",
            Self::SubscribeDecodeError => "subscribe-decode-error",
            Self::SubscriptionClosed => "subscription-closed",
            Self::HistoryAppendError => "history-append-error",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry on a session's diagnostic queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLog {
    pub tag: LogTag,
    pub message: String,
}

impl fmt::Display for ChatLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.tag, self.message)
    }
}

/// Worker-side handle to the diagnostic queue.
///
/// Emitting never waits: the entry always goes to `tracing`, and is offered
/// to the queue with `try_send`. A full or abandoned queue drops the entry.
#[derive(Clone)]
pub(crate) struct Diagnostics {
    tx: mpsc::Sender<ChatLog>,
    room: String,
}

impl Diagnostics {
    pub(crate) fn new(tx: mpsc::Sender<ChatLog>, room: String) -> Self {
        Self { tx, room }
    }

    pub(crate) fn emit(&self, tag: LogTag, message: impl Into<String>) {
        let message = message.into();
        warn!(room = %self.room, tag = %tag, "{message}");
        if let Err(e) = self.tx.try_send(ChatLog { tag, message }) {
            debug!(room = %self.room, tag = %tag, error = %e, "diagnostic dropped");
        }
    }
}
