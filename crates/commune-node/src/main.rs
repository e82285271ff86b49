//! commune-node — terminal client for Commune group chat.
//!
//! Startup sequence:
//!   1. Parse flags, optionally reset the local history file
//!   2. Start the P2P overlay (libp2p GossipSub + Kademlia)
//!   3. Join the room topic (starts the publish and subscribe workers)
//!   4. Run the main loop: stdin lines → room, room → terminal

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use commune_core::constants::{
    DEFAULT_HISTORY_PATH, DEFAULT_ORIGIN_IP, DEFAULT_ORIGIN_PORT, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_ROOM, MAX_HISTORY_MESSAGES, PLACEHOLDER_KEY, PLACEHOLDER_MODULE_NAME,
    PLACEHOLDER_SIGNATURE,
};
use commune_core::ChatEnvelope;
use commune_history::HistoryStore;
use commune_p2p::{P2pConfig, P2pNetwork};
use commune_room::{RoomConfig, RoomSession, TransportMeta};

const BANNER: &str = r"
  ___ ___  __  __ __  __ _   _ _  _ ___    ___ _  _   _ _____
 / __/ _ \|  \/  |  \/  | | | | \| | __|  / __| || | /_\_   _|
| (_| (_) | |\/| | |\/| | |_| | .` | _|  | (__| __ |/ _ \| |
 \___\___/|_|  |_|_|  |_|\___/|_|\_|___|  \___|_||_/_/ \_\_|
";

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,commune_node=info,commune_room=info,commune_p2p=info";

/// How long shutdown waits for queued lines to be published.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "commune-node",
    version,
    about = "Commune — peer-to-peer group chat over GossipSub"
)]
struct Args {
    /// Username to use in the chatroom.
    #[arg(long, default_value = "")]
    user: String,

    /// Chatroom to join. Empty joins the fallback room.
    #[arg(long, default_value = "")]
    room: String,

    /// Room joined when --room is empty.
    #[arg(long, default_value = DEFAULT_ROOM)]
    fallback_room: String,

    /// IP address advertised in outgoing messages.
    #[arg(long, default_value = DEFAULT_ORIGIN_IP)]
    ip: String,

    /// Port advertised in outgoing messages.
    #[arg(long, default_value = DEFAULT_ORIGIN_PORT)]
    port: String,

    /// Public key of the module (placeholder, not verified).
    #[arg(long, default_value = PLACEHOLDER_KEY)]
    key: String,

    /// Message signature (placeholder, not verified).
    #[arg(long, default_value = PLACEHOLDER_SIGNATURE)]
    signature: String,

    /// Module name (placeholder).
    #[arg(long, default_value = PLACEHOLDER_MODULE_NAME)]
    module_name: String,

    /// File holding the most recent received messages.
    #[arg(long, default_value = DEFAULT_HISTORY_PATH)]
    history_path: PathBuf,

    /// Start with an empty history file.
    #[arg(long)]
    fresh_history: bool,

    /// Print the stored history before joining.
    #[arg(long)]
    replay: bool,

    /// P2P listen address.
    #[arg(long, default_value = "/ip4/0.0.0.0/tcp/0")]
    p2p_listen: String,

    /// Bootstrap peer multiaddresses (comma-separated).
    #[arg(long, value_delimiter = ',')]
    bootstrap: Vec<String>,

    /// Skip the start-up banner.
    #[arg(long)]
    no_banner: bool,
}

impl Args {
    fn p2p_config(&self) -> P2pConfig {
        P2pConfig {
            listen_addr: self.p2p_listen.clone(),
            bootstrap_peers: self.bootstrap.clone(),
            ..P2pConfig::default()
        }
    }

    fn room_config(&self, history_path: PathBuf) -> RoomConfig {
        RoomConfig {
            user_name: self.user.clone(),
            room_name: self.room.clone(),
            fallback_room: self.fallback_room.clone(),
            history_path,
            history_capacity: MAX_HISTORY_MESSAGES,
            transport: TransportMeta {
                ip: self.ip.clone(),
                port: self.port.clone(),
                signature: self.signature.clone(),
                credential_key: self.key.clone(),
                module_name: self.module_name.clone(),
            },
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    if !args.no_banner {
        println!("{BANNER}");
    }
    println!("The Commune application is starting.");
    println!("Peer discovery may take up to 30 seconds.");
    println!();

    // ── History file ──────────────────────────────────────────────────────────
    let history_path = expand_tilde(&args.history_path);
    let history = HistoryStore::open(&history_path, MAX_HISTORY_MESSAGES);
    if args.fresh_history {
        history
            .clear()
            .with_context(|| format!("resetting history at {}", history_path.display()))?;
        info!(path = %history_path.display(), "history reset");
    }
    if args.replay {
        let stored = history
            .load()
            .with_context(|| format!("reading history at {}", history_path.display()))?;
        println!("── {} stored message(s) ──", stored.len());
        for envelope in &stored {
            print_envelope(None, envelope);
        }
        println!("──────────────────────────");
    }

    // ── P2P network ───────────────────────────────────────────────────────────
    let p2p_config = args.p2p_config();
    let (p2p_network, p2p_handle) =
        P2pNetwork::new(&p2p_config).map_err(|e| anyhow::anyhow!("building P2P network: {e}"))?;
    info!(peer_id = %p2p_handle.local_peer_id, "P2P identity");
    tokio::spawn(p2p_network.run());

    // ── Room ──────────────────────────────────────────────────────────────────
    let mut session = RoomSession::join(&p2p_handle, args.room_config(history_path))
        .await
        .context("joining chat room")?;
    println!(
        "Joined the '{}' chatroom as '{}' (peer id {}).",
        session.room_name(),
        session.user_name(),
        session.self_id()
    );

    // ── Stdin → outbound ──────────────────────────────────────────────────────
    let mut stdin_task = tokio::spawn(read_stdin(session.outbound()));

    // ── Main loop ─────────────────────────────────────────────────────────────
    let mut input_closed = false;
    loop {
        tokio::select! {
            msg = session.inbound.recv() => {
                match msg {
                    Some(envelope) => print_envelope(Some(chrono::Local::now()), &envelope),
                    None => {
                        warn!("subscription closed; leaving the room");
                        break;
                    }
                }
            }

            Some(log) = session.logs.recv() => {
                debug!(%log, "room diagnostic");
            }

            _ = &mut stdin_task => {
                info!("input closed");
                input_closed = true;
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    // Piped input: publish whatever is still queued before leaving.
    if input_closed && !session.flush(SHUTDOWN_GRACE).await {
        warn!("outbound queue not drained before shutdown; unsent lines were dropped");
    }
    session.leave();
    if tokio::time::timeout(SHUTDOWN_GRACE, session.stopped()).await.is_err() {
        warn!("publish worker did not stop in time");
    }
    info!("left the room");
    Ok(())
}

/// Forward trimmed, non-empty stdin lines to the room until EOF or until the
/// publish worker stops. On EOF the main loop flushes the outbound queue
/// before leaving; Ctrl-C leaves at once and drops anything still queued.
async fn read_stdin(outbound: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if outbound.send(text.to_string()).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                return;
            }
        }
    }
}

fn print_envelope(received_at: Option<chrono::DateTime<chrono::Local>>, envelope: &ChatEnvelope) {
    match received_at {
        Some(ts) => println!("\n[{}] New message from {}:", ts.format("%H:%M:%S"), envelope.sender_id),
        None => println!("\nMessage from {}:", envelope.sender_id),
    }
    println!("{}", envelope.body);
    println!("IP: {}  Port: {}", envelope.origin_ip, envelope.origin_port);
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
