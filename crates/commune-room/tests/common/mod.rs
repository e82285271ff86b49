//! In-process overlay used by the room tests.
//!
//! A `MemoryBus` is a shared hub. Each `MemoryNode` on it is one peer with a
//! string identity; publishing on a topic fans the payload out to every
//! subscription of that topic on the bus, the publisher's own included, just
//! like a gossip mesh echoing a message back to its author.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use commune_core::error::CommuneError;
use commune_core::overlay::{Delivery, Overlay, Subscription, Topic};
use tokio::sync::mpsc;

type Feed = mpsc::UnboundedSender<Result<Delivery<String>, CommuneError>>;

#[derive(Default)]
struct BusState {
    subscribers: Mutex<HashMap<String, Vec<Feed>>>,
    joined: Mutex<Vec<String>>,
    next_calls: AtomicUsize,
    fail_join: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_publish: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<BusState>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, identity: &str) -> MemoryNode {
        MemoryNode { bus: self.clone(), identity: identity.to_string() }
    }

    /// Topic names passed to `join`, in call order.
    pub fn joined_topics(&self) -> Vec<String> {
        self.state.joined.lock().unwrap().clone()
    }

    /// Total `Subscription::next` calls made on this bus.
    pub fn next_calls(&self) -> usize {
        self.state.next_calls.load(Ordering::SeqCst)
    }

    pub fn fail_join(&self, fail: bool) {
        self.state.fail_join.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.state.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.state.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Deliver raw bytes on `topic` as if `origin` had published them.
    pub fn inject(&self, topic: &str, origin: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let mut subs = self.state.subscribers.lock().unwrap();
        if let Some(feeds) = subs.get_mut(topic) {
            feeds.retain(|feed| {
                feed.send(Ok(Delivery { data: data.clone(), origin: origin.to_string() }))
                    .is_ok()
            });
        }
    }

    /// Make every subscription on `topic` return an error from `next`.
    pub fn break_subscriptions(&self, topic: &str, reason: &str) {
        let mut subs = self.state.subscribers.lock().unwrap();
        if let Some(feeds) = subs.remove(topic) {
            for feed in feeds {
                let _ = feed.send(Err(CommuneError::SubscriptionClosed(reason.to_string())));
            }
        }
    }

    fn register(&self, topic: &str) -> mpsc::UnboundedReceiver<Result<Delivery<String>, CommuneError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .subscribers
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }
}

pub struct MemoryNode {
    bus: MemoryBus,
    identity: String,
}

#[async_trait]
impl Overlay for MemoryNode {
    type Identity = String;
    type Topic = MemoryTopic;

    fn local_identity(&self) -> String {
        self.identity.clone()
    }

    async fn join(&self, topic_name: &str) -> Result<MemoryTopic, CommuneError> {
        self.bus.state.joined.lock().unwrap().push(topic_name.to_string());
        if self.bus.state.fail_join.load(Ordering::SeqCst) {
            return Err(CommuneError::Transport("join refused".into()));
        }
        Ok(MemoryTopic {
            bus: self.bus.clone(),
            name: topic_name.to_string(),
            identity: self.identity.clone(),
        })
    }
}

pub struct MemoryTopic {
    bus: MemoryBus,
    name: String,
    identity: String,
}

#[async_trait]
impl Topic for MemoryTopic {
    type Identity = String;
    type Subscription = MemorySubscription;

    async fn subscribe(&self) -> Result<MemorySubscription, CommuneError> {
        if self.bus.state.fail_subscribe.load(Ordering::SeqCst) {
            return Err(CommuneError::SubscriptionClosed("subscribe refused".into()));
        }
        Ok(MemorySubscription { bus: self.bus.clone(), rx: self.bus.register(&self.name) })
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), CommuneError> {
        if self.bus.state.fail_publish.load(Ordering::SeqCst) {
            return Err(CommuneError::Transport("no peers".into()));
        }
        self.bus.inject(&self.name, &self.identity, data);
        Ok(())
    }
}

pub struct MemorySubscription {
    bus: MemoryBus,
    rx: mpsc::UnboundedReceiver<Result<Delivery<String>, CommuneError>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    type Identity = String;

    async fn next(&mut self) -> Result<Delivery<String>, CommuneError> {
        self.bus.state.next_calls.fetch_add(1, Ordering::SeqCst);
        match self.rx.recv().await {
            Some(item) => item,
            None => Err(CommuneError::SubscriptionClosed("bus dropped".into())),
        }
    }
}

/// Await `fut`, failing the test if it takes longer than two seconds.
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("timed out waiting for room activity")
}

/// Poll `cond` until it holds, for up to two seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    within(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}
