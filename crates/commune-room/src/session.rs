use std::sync::Arc;
use std::time::Duration;

use commune_core::envelope::ChatEnvelope;
use commune_core::error::CommuneError;
use commune_core::overlay::{Overlay, Topic};
use commune_history::HistoryStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{RoomConfig, TransportMeta};
use crate::diagnostics::{ChatLog, Diagnostics};
use crate::publish::PublishWorker;
use crate::subscribe::SubscribeWorker;

/// Membership of one room on an overlay.
///
/// Created by [`RoomSession::join`], which also starts the publish and
/// subscribe workers. Text goes in through [`RoomSession::outbound`]; received
/// envelopes come out of `inbound` and worker diagnostics out of `logs`.
///
/// `inbound` yields `None` once the subscription has ended. The session is
/// then half-broken (publishing still works, receiving does not) and should
/// be abandoned by the caller.
///
/// Dropping the session fires its cancellation token.
pub struct RoomSession<O: Overlay> {
    /// Envelopes received from other peers, in overlay delivery order.
    pub inbound: mpsc::Receiver<ChatEnvelope>,
    /// Worker diagnostics.
    pub logs: mpsc::Receiver<ChatLog>,

    outbound: mpsc::Sender<String>,
    room_name: String,
    user_name: String,
    topic_name: String,
    self_id: O::Identity,
    transport: TransportMeta,
    topic: Arc<O::Topic>,
    history: Arc<HistoryStore>,
    cancel: CancellationToken,
    publish_task: JoinHandle<()>,
    subscribe_task: JoinHandle<()>,
}

impl<O: Overlay> RoomSession<O> {
    /// Join the room described by `config` and start both workers.
    ///
    /// An empty room name is replaced by `config.fallback_room` (or
    /// [`commune_core::DEFAULT_ROOM`] when that is blank too) before the
    /// topic name is derived. Failure to join or subscribe is returned as
    /// [`CommuneError::Join`] and nothing is left running.
    pub async fn join(overlay: &O, config: RoomConfig) -> Result<Self, CommuneError> {
        let room_name = config.resolved_room_name().to_string();
        let topic_name = config.topic_name();
        let join_err = |e: CommuneError| match e {
            CommuneError::Join { .. } => e,
            other => CommuneError::Join { topic: topic_name.clone(), reason: other.to_string() },
        };

        let topic = overlay.join(&topic_name).await.map_err(join_err)?;
        let subscription = topic.subscribe().await.map_err(join_err)?;
        let topic = Arc::new(topic);

        let self_id = overlay.local_identity();
        let history = Arc::new(HistoryStore::open(&config.history_path, config.history_capacity));
        let cancel = CancellationToken::new();

        let capacity = config.queue_capacity.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (logs_tx, logs_rx) = mpsc::channel(capacity);
        let diagnostics = Diagnostics::new(logs_tx, room_name.clone());

        let subscribe_task = tokio::spawn(
            SubscribeWorker {
                subscription,
                self_id: self_id.clone(),
                inbound: inbound_tx,
                history: Arc::clone(&history),
                cancel: cancel.clone(),
                diagnostics: diagnostics.clone(),
            }
            .run(),
        );

        let publish_task = tokio::spawn(
            PublishWorker {
                topic: Arc::clone(&topic),
                outbound: outbound_rx,
                sender_id: self_id.to_string(),
                transport: config.transport.clone(),
                cancel: cancel.clone(),
                diagnostics,
            }
            .run(),
        );

        info!(room = %room_name, user = %config.user_name, topic = %topic_name, peer = %self_id, "joined room");

        Ok(Self {
            inbound: inbound_rx,
            logs: logs_rx,
            outbound: outbound_tx,
            room_name,
            user_name: config.user_name,
            topic_name,
            self_id,
            transport: config.transport,
            topic,
            history,
            cancel,
            publish_task,
            subscribe_task,
        })
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn self_id(&self) -> &O::Identity {
        &self.self_id
    }

    pub fn transport(&self) -> &TransportMeta {
        &self.transport
    }

    pub fn topic(&self) -> &O::Topic {
        &self.topic
    }

    /// The history file this session's subscribe worker appends to.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// A producer handle for the outbound queue.
    pub fn outbound(&self) -> mpsc::Sender<String> {
        self.outbound.clone()
    }

    /// Queue one text for publishing. Fails with
    /// [`CommuneError::SessionClosed`] only once the publish worker has
    /// stopped; overlay failures are reported on `logs` instead.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), CommuneError> {
        self.outbound
            .send(text.into())
            .await
            .map_err(|_| CommuneError::SessionClosed("publish worker has stopped".into()))
    }

    /// Wait until the publish worker has taken every queued text, giving up
    /// after `limit`. Returns whether the queue emptied.
    ///
    /// A text taken but still being published is not waited for here; call
    /// [`RoomSession::leave`] then [`RoomSession::stopped`] for that.
    pub async fn flush(&self, limit: Duration) -> bool {
        let drained = async {
            while self.outbound.capacity() < self.outbound.max_capacity()
                && !self.publish_task.is_finished()
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(limit, drained).await.is_ok()
            && self.outbound.capacity() == self.outbound.max_capacity()
    }

    /// Wait for the publish worker to exit. Only returns after
    /// [`RoomSession::leave`] (or once the worker fails).
    pub async fn stopped(&mut self) {
        if let Err(e) = (&mut self.publish_task).await {
            debug!(error = %e, "publish worker ended abnormally");
        }
    }

    /// Fire the cancellation token. Each worker stops at the top of its next
    /// loop iteration; an overlay call already in flight runs to completion.
    pub fn leave(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn publish_worker_finished(&self) -> bool {
        self.publish_task.is_finished()
    }

    pub fn subscribe_worker_finished(&self) -> bool {
        self.subscribe_task.is_finished()
    }
}

impl<O: Overlay> Drop for RoomSession<O> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
