/// ─── Commune Chat Constants ─────────────────────────────────────────────────
///
/// Defaults shared by the room engine, the history store and the CLI.
/// Everything here can be overridden through `RoomConfig`; the constants are
/// only the values used when the caller does not.

// ── Rooms ────────────────────────────────────────────────────────────────────

/// Room joined when the caller supplies an empty room name.
pub const DEFAULT_ROOM: &str = "connection";

/// Namespace prefix for room topics on the overlay. Keeps chat rooms from
/// colliding with any other topic carried by the same gossip mesh.
pub const ROOM_TOPIC_PREFIX: &str = "room-peerchat-";

// ── History ──────────────────────────────────────────────────────────────────

/// Maximum number of envelopes retained in the history file.
pub const MAX_HISTORY_MESSAGES: usize = 100;

/// Default location of the history file, relative to the working directory.
pub const DEFAULT_HISTORY_PATH: &str = "node/chat/messages.json";

// ── Queues ───────────────────────────────────────────────────────────────────

/// Capacity of the outbound, inbound and diagnostic queues of a session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

// ── Placeholder transport metadata ───────────────────────────────────────────

pub const DEFAULT_ORIGIN_IP: &str = "127.0.0.1";
pub const DEFAULT_ORIGIN_PORT: &str = "8080";

/// Placeholder credential. Carried on the wire, never verified.
pub const PLACEHOLDER_KEY: &str = "dummyKEY";
/// Placeholder signature. Carried on the wire, never verified.
pub const PLACEHOLDER_SIGNATURE: &str = "dummySIG";
pub const PLACEHOLDER_MODULE_NAME: &str = "dummyModule";

/// Derive the overlay topic name for a room. The caller is expected to have
/// substituted the fallback room name already.
pub fn room_topic(room_name: &str) -> String {
    format!("{ROOM_TOPIC_PREFIX}{room_name}")
}
