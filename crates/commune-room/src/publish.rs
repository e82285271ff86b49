use std::sync::Arc;

use commune_core::envelope::ChatEnvelope;
use commune_core::overlay::Topic;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::TransportMeta;
use crate::diagnostics::{Diagnostics, LogTag};

/// Drains the outbound text queue onto the room topic.
///
/// Delivery is at most once: a text that fails to encode or publish is
/// reported and dropped, never retried.
pub(crate) struct PublishWorker<T: Topic> {
    pub(crate) topic: Arc<T>,
    pub(crate) outbound: mpsc::Receiver<String>,
    pub(crate) sender_id: String,
    pub(crate) transport: TransportMeta,
    pub(crate) cancel: CancellationToken,
    pub(crate) diagnostics: Diagnostics,
}

impl<T: Topic> PublishWorker<T> {
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("publish worker cancelled");
                    return;
                }

                text = self.outbound.recv() => {
                    let Some(text) = text else {
                        debug!("outbound queue closed; publish worker exiting");
                        return;
                    };
                    self.publish(text).await;
                }
            }
        }
    }

    async fn publish(&self, text: String) {
        let envelope = self.envelope(text);
        let bytes = match envelope.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.diagnostics
                    .emit(LogTag::PublishEncodeError, format!("could not encode envelope: {e}"));
                return;
            }
        };

        let len = bytes.len();
        match self.topic.publish(bytes).await {
            Ok(()) => trace!(bytes = len, "published"),
            Err(e) => self
                .diagnostics
                .emit(LogTag::PublishSendError, format!("could not publish to topic: {e}")),
        }
    }

    /// Credential key and module name are deliberately left empty on the wire.
    fn envelope(&self, text: String) -> ChatEnvelope {
        ChatEnvelope {
            body: text,
            sender_id: self.sender_id.clone(),
            origin_ip: self.transport.ip.clone(),
            origin_port: self.transport.port.clone(),
            signature: self.transport.signature.clone(),
            ..ChatEnvelope::default()
        }
    }
}
