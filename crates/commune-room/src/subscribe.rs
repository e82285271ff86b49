use std::sync::Arc;

use commune_core::envelope::ChatEnvelope;
use commune_core::error::CommuneError;
use commune_core::overlay::Subscription;
use commune_history::HistoryStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::diagnostics::{Diagnostics, LogTag};

/// Moves deliveries from the room subscription onto the inbound queue and
/// into the history file.
///
/// The worker owns the only `inbound` sender. Returning drops it, so the
/// inbound queue closes exactly once, when the worker ends.
pub(crate) struct SubscribeWorker<S: Subscription> {
    pub(crate) subscription: S,
    pub(crate) self_id: S::Identity,
    pub(crate) inbound: mpsc::Sender<ChatEnvelope>,
    pub(crate) history: Arc<HistoryStore>,
    pub(crate) cancel: CancellationToken,
    pub(crate) diagnostics: Diagnostics,
}

impl<S: Subscription> SubscribeWorker<S> {
    pub(crate) async fn run(self) {
        let Self { mut subscription, self_id, inbound, history, cancel, diagnostics } = self;

        loop {
            if cancel.is_cancelled() {
                debug!("subscribe worker cancelled");
                return;
            }

            let delivery = match subscription.next().await {
                Ok(delivery) => delivery,
                Err(e) => {
                    drop(inbound);
                    diagnostics.emit(LogTag::SubscriptionClosed, format!("subscription has closed: {e}"));
                    return;
                }
            };

            if delivery.origin == self_id {
                trace!("dropping self-echo");
                continue;
            }

            let envelope = match ChatEnvelope::from_bytes(&delivery.data) {
                Ok(envelope) => envelope,
                Err(e) => {
                    diagnostics.emit(
                        LogTag::SubscribeDecodeError,
                        format!("could not decode message from {}: {e}", delivery.origin),
                    );
                    continue;
                }
            };

            if inbound.send(envelope.clone()).await.is_err() {
                debug!("inbound receiver dropped; message not delivered locally");
            }

            let store = Arc::clone(&history);
            let appended = tokio::task::spawn_blocking(move || store.append(&envelope))
                .await
                .unwrap_or_else(|e| Err(CommuneError::Storage(format!("history task failed: {e}"))));
            if let Err(e) = appended {
                diagnostics.emit(LogTag::HistoryAppendError, format!("could not save message: {e}"));
            }
        }
    }
}
