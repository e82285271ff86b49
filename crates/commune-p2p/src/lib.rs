//! commune-p2p
//!
//! libp2p overlay for Commune chat rooms.
//!
//! GossipSub carries room topics between peers.
//! Kademlia DHT handles peer discovery and bootstrap.
//! Identify and Ping maintain connection metadata and liveness.
//!
//! `P2pHandle` implements the `commune_core::overlay` traits, so a room
//! session can run on it without knowing anything about libp2p.

pub mod config;
pub mod network;
pub mod overlay;

pub use config::P2pConfig;
pub use network::{P2pHandle, P2pNetwork};
pub use overlay::{P2pSubscription, P2pTopic};
