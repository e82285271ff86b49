//! Capabilities the room engine consumes from the publish/subscribe overlay.
//!
//! The overlay (transport, encryption, peer discovery, gossip routing) is
//! supplied from outside. `commune-p2p` provides the libp2p implementation;
//! tests use an in-memory one.

use std::fmt;

use async_trait::async_trait;

use crate::error::CommuneError;

/// One payload delivered on a subscription.
#[derive(Debug, Clone)]
pub struct Delivery<I> {
    pub data: Vec<u8>,
    /// Identity of the peer the payload originated from.
    pub origin: I,
}

/// An overlay node able to join named topics.
#[async_trait]
pub trait Overlay: Send + Sync {
    /// Opaque peer identity, comparable for equality and printable as text.
    type Identity: Clone + Eq + fmt::Display + fmt::Debug + Send + Sync + 'static;
    type Topic: Topic<Identity = Self::Identity>;

    /// Identity of the local participant.
    fn local_identity(&self) -> Self::Identity;

    async fn join(&self, topic_name: &str) -> Result<Self::Topic, CommuneError>;
}

/// A joined topic.
#[async_trait]
pub trait Topic: Send + Sync + 'static {
    type Identity: Clone + Eq + fmt::Display + fmt::Debug + Send + Sync + 'static;
    type Subscription: Subscription<Identity = Self::Identity>;

    async fn subscribe(&self) -> Result<Self::Subscription, CommuneError>;

    async fn publish(&self, data: Vec<u8>) -> Result<(), CommuneError>;
}

/// A stream of deliveries for one topic.
#[async_trait]
pub trait Subscription: Send + 'static {
    type Identity: Clone + Eq + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Wait for the next delivery. An error means the subscription is over
    /// and will not yield again.
    async fn next(&mut self) -> Result<Delivery<Self::Identity>, CommuneError>;
}
