/// Configuration for the Commune P2P overlay.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Local listen address (e.g. "/ip4/0.0.0.0/tcp/4001"). Port 0 picks one.
    pub listen_addr: String,
    /// Bootstrap peer multiaddresses, each ending in `/p2p/<peer id>`.
    pub bootstrap_peers: Vec<String>,
    /// Protocol version string advertised to peers.
    pub protocol_version: String,
    /// Capacity of the command queue and of each subscription feed.
    pub channel_capacity: usize,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addr: "/ip4/0.0.0.0/tcp/0".into(),
            bootstrap_peers: Vec::new(),
            protocol_version: "/commune/1.0.0".into(),
            channel_capacity: 256,
        }
    }
}
