use async_trait::async_trait;
use commune_core::error::CommuneError;
use commune_core::overlay::{Delivery, Overlay, Subscription, Topic};
use libp2p::gossipsub::TopicHash;
use libp2p::PeerId;
use tokio::sync::{mpsc, oneshot};

use crate::network::{Command, P2pHandle};

fn stopped() -> CommuneError {
    CommuneError::Transport("p2p network dropped the request".into())
}

#[async_trait]
impl Overlay for P2pHandle {
    type Identity = PeerId;
    type Topic = P2pTopic;

    fn local_identity(&self) -> PeerId {
        self.local_peer_id
    }

    async fn join(&self, topic_name: &str) -> Result<P2pTopic, CommuneError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Join { topic: topic_name.to_string(), reply }).await?;
        let hash = rx.await.map_err(|_| stopped())??;
        Ok(P2pTopic { handle: self.clone(), name: topic_name.to_string(), hash })
    }
}

/// A gossip topic joined through a [`P2pHandle`].
pub struct P2pTopic {
    handle: P2pHandle,
    name: String,
    hash: TopicHash,
}

impl P2pTopic {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Topic for P2pTopic {
    type Identity = PeerId;
    type Subscription = P2pSubscription;

    async fn subscribe(&self) -> Result<P2pSubscription, CommuneError> {
        let (reply, rx) = oneshot::channel();
        self.handle.command(Command::Subscribe { topic: self.hash.clone(), reply }).await?;
        let feed = rx.await.map_err(|_| stopped())?;
        Ok(P2pSubscription { topic: self.name.clone(), feed })
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), CommuneError> {
        let (reply, rx) = oneshot::channel();
        self.handle
            .command(Command::Publish { topic: self.hash.clone(), data, reply })
            .await?;
        rx.await.map_err(|_| stopped())?
    }
}

/// Deliveries for one topic, fed by the network loop.
pub struct P2pSubscription {
    topic: String,
    feed: mpsc::Receiver<Delivery<PeerId>>,
}

#[async_trait]
impl Subscription for P2pSubscription {
    type Identity = PeerId;

    async fn next(&mut self) -> Result<Delivery<PeerId>, CommuneError> {
        self.feed.recv().await.ok_or_else(|| {
            CommuneError::SubscriptionClosed(format!("feed for {} ended", self.topic))
        })
    }
}
