use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use commune_core::error::CommuneError;
use commune_core::overlay::Delivery;
use futures::StreamExt;
use libp2p::{
    gossipsub, identify, kad, noise, ping, tcp, yamux,
    gossipsub::TopicHash,
    swarm::SwarmEvent,
    Multiaddr, PeerId, Swarm,
};
use libp2p_swarm::NetworkBehaviour;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::P2pConfig;

/// Combined libp2p network behaviour for Commune.
///
/// The `#[derive(NetworkBehaviour)]` macro auto-generates a
/// `CommuneBehaviourEvent` enum with one variant per field.
#[derive(NetworkBehaviour)]
pub struct CommuneBehaviour {
    pub gossipsub: gossipsub::Behaviour,
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}

/// Requests from handles to the task that owns the swarm.
pub(crate) enum Command {
    Join {
        topic: String,
        reply: oneshot::Sender<Result<TopicHash, CommuneError>>,
    },
    Subscribe {
        topic: TopicHash,
        reply: oneshot::Sender<mpsc::Receiver<Delivery<PeerId>>>,
    },
    Publish {
        topic: TopicHash,
        data: Vec<u8>,
        reply: oneshot::Sender<Result<(), CommuneError>>,
    },
}

/// Application-facing handle returned from `P2pNetwork::new()`.
///
/// Cheap to clone. Implements [`commune_core::overlay::Overlay`].
#[derive(Clone)]
pub struct P2pHandle {
    pub(crate) commands: mpsc::Sender<Command>,
    /// Local libp2p peer identity.
    pub local_peer_id: PeerId,
}

impl P2pHandle {
    pub(crate) async fn command(&self, cmd: Command) -> Result<(), CommuneError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| CommuneError::Transport("p2p network has stopped".into()))
    }
}

/// Owns the libp2p Swarm. Pass to `tokio::spawn(network.run())`.
pub struct P2pNetwork {
    swarm: Swarm<CommuneBehaviour>,
    commands: mpsc::Receiver<Command>,
    subscribers: HashMap<TopicHash, Vec<mpsc::Sender<Delivery<PeerId>>>>,
    feed_capacity: usize,
    /// Deliveries lost to full subscriber feeds since start-up.
    dropped: u64,
}

impl P2pNetwork {
    /// Build the network and return `(P2pNetwork, P2pHandle)`.
    ///
    /// Starts listening and dials every bootstrap peer; topics are joined
    /// later through the handle.
    pub fn new(
        config: &P2pConfig,
    ) -> Result<(Self, P2pHandle), Box<dyn std::error::Error + Send + Sync>> {
        let mut swarm = libp2p::SwarmBuilder::with_new_identity()
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )?
            .with_behaviour(|key: &libp2p::identity::Keypair| {
                // Author and sequence number make each publish unique, so the
                // same text sent twice is not suppressed as a duplicate.
                let message_id_fn = |msg: &gossipsub::Message| {
                    let mut s = DefaultHasher::new();
                    msg.source.hash(&mut s);
                    msg.sequence_number.hash(&mut s);
                    msg.data.hash(&mut s);
                    gossipsub::MessageId::from(s.finish().to_string())
                };

                let gossipsub_config = gossipsub::ConfigBuilder::default()
                    .heartbeat_interval(Duration::from_secs(1))
                    .validation_mode(gossipsub::ValidationMode::Strict)
                    .message_id_fn(message_id_fn)
                    .build()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let gossipsub = gossipsub::Behaviour::new(
                    gossipsub::MessageAuthenticity::Signed(key.clone()),
                    gossipsub_config,
                )
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

                let store = kad::store::MemoryStore::new(key.public().to_peer_id());
                let mut kademlia = kad::Behaviour::new(key.public().to_peer_id(), store);
                kademlia.set_mode(Some(kad::Mode::Server));

                let identify = identify::Behaviour::new(identify::Config::new(
                    config.protocol_version.clone(),
                    key.public(),
                ));

                let ping = ping::Behaviour::default();

                Ok(CommuneBehaviour { gossipsub, kademlia, identify, ping })
            })?
            .with_swarm_config(|c| c.with_idle_connection_timeout(Duration::from_secs(60)))
            .build();

        let listen_addr: Multiaddr = config.listen_addr.parse()?;
        swarm.listen_on(listen_addr)?;

        let mut known_peers = 0usize;
        for addr_str in &config.bootstrap_peers {
            let addr = match addr_str.parse::<Multiaddr>() {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(addr = %addr_str, error = %e, "ignoring malformed bootstrap address");
                    continue;
                }
            };
            let Some(libp2p::multiaddr::Protocol::P2p(peer_id)) = addr.iter().last() else {
                warn!(addr = %addr, "bootstrap address lacks /p2p/<peer id>; ignoring");
                continue;
            };
            swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
            if let Err(e) = swarm.dial(addr.clone()) {
                warn!(peer = %peer_id, error = %e, "could not dial bootstrap peer");
                continue;
            }
            known_peers += 1;
            debug!(peer = %peer_id, "added bootstrap peer");
        }
        if known_peers > 0 {
            if let Err(e) = swarm.behaviour_mut().kademlia.bootstrap() {
                warn!(error = %e, "kademlia bootstrap failed");
            }
        }

        let local_peer_id = *swarm.local_peer_id();
        let capacity = config.channel_capacity.max(1);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);

        let network = P2pNetwork {
            swarm,
            commands: commands_rx,
            subscribers: HashMap::new(),
            feed_capacity: capacity,
            dropped: 0,
        };
        let handle = P2pHandle { commands: commands_tx, local_peer_id };

        Ok((network, handle))
    }

    /// Drive the P2P event loop. Run in a dedicated tokio task.
    ///
    /// Returns once every handle has been dropped. All subscription feeds
    /// close with it.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        info!("all P2P handles dropped; network loop exiting");
                        return;
                    };
                    self.handle_command(cmd);
                }

                event = self.swarm.select_next_some() => {
                    self.handle_event(event);
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Join { topic, reply } => {
                let ident = gossipsub::IdentTopic::new(&topic);
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .subscribe(&ident)
                    .map(|_| ident.hash())
                    .map_err(|e| CommuneError::Join { topic: topic.clone(), reason: e.to_string() });
                if result.is_ok() {
                    info!(topic = %topic, "joined gossip topic");
                }
                let _ = reply.send(result);
            }
            Command::Subscribe { topic, reply } => {
                let (tx, rx) = mpsc::channel(self.feed_capacity);
                self.subscribers.entry(topic).or_default().push(tx);
                let _ = reply.send(rx);
            }
            Command::Publish { topic, data, reply } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .publish(topic, data)
                    .map(|_| ())
                    .map_err(|e| CommuneError::Transport(e.to_string()));
                if let Err(e) = &result {
                    debug!(error = %e, "gossipsub publish failed");
                }
                let _ = reply.send(result);
            }
        }
    }

    fn handle_event(&mut self, event: SwarmEvent<CommuneBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(addr = %address, "P2P listening on");
            }
            SwarmEvent::Behaviour(CommuneBehaviourEvent::Gossipsub(
                gossipsub::Event::Message { propagation_source, message, .. },
            )) => {
                let origin = message.source.unwrap_or(propagation_source);
                self.dispatch(&message.topic, Delivery { data: message.data, origin });
            }
            SwarmEvent::Behaviour(CommuneBehaviourEvent::Gossipsub(
                gossipsub::Event::Subscribed { peer_id, topic },
            )) => {
                debug!(peer = %peer_id, topic = %topic, "peer subscribed");
            }
            SwarmEvent::Behaviour(CommuneBehaviourEvent::Identify(
                identify::Event::Received { peer_id, info, .. },
            )) => {
                for addr in info.listen_addrs {
                    self.swarm
                        .behaviour_mut()
                        .kademlia
                        .add_address(&peer_id, addr);
                }
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(peer = %peer_id, "connection established");
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!(peer = %peer_id, "connection closed");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                warn!(peer = ?peer_id, error = %error, "outgoing connection failed");
            }
            _ => {}
        }
    }

    /// Hand a delivery to every live feed of `topic`. The swarm loop never
    /// waits on a feed: a full feed loses the delivery (counted in
    /// `dropped`), a closed one is forgotten.
    fn dispatch(&mut self, topic: &TopicHash, delivery: Delivery<PeerId>) {
        let Some(feeds) = self.subscribers.get_mut(topic) else {
            debug!(topic = %topic, "message for topic without local subscribers");
            return;
        };
        let dropped = &mut self.dropped;
        feeds.retain(|feed| match feed.try_send(delivery.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                *dropped += 1;
                warn!(
                    topic = %topic,
                    origin = %delivery.origin,
                    dropped_total = *dropped,
                    "subscription feed full; delivery lost before reaching the room"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Deliveries lost to full subscriber feeds since start-up.
    pub fn dropped_deliveries(&self) -> u64 {
        self.dropped
    }
}
