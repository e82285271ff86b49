use std::path::PathBuf;

use commune_core::constants::{
    room_topic, DEFAULT_HISTORY_PATH, DEFAULT_ORIGIN_IP, DEFAULT_ORIGIN_PORT, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_ROOM, MAX_HISTORY_MESSAGES, PLACEHOLDER_KEY, PLACEHOLDER_MODULE_NAME,
    PLACEHOLDER_SIGNATURE,
};

/// Transport metadata stamped onto every envelope this peer publishes.
///
/// All fields are opaque strings passed through unvalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMeta {
    pub ip: String,
    pub port: String,
    pub signature: String,
    pub credential_key: String,
    pub module_name: String,
}

impl Default for TransportMeta {
    fn default() -> Self {
        Self {
            ip: DEFAULT_ORIGIN_IP.into(),
            port: DEFAULT_ORIGIN_PORT.into(),
            signature: PLACEHOLDER_SIGNATURE.into(),
            credential_key: PLACEHOLDER_KEY.into(),
            module_name: PLACEHOLDER_MODULE_NAME.into(),
        }
    }
}

/// Everything a room session needs at construction time.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub user_name: String,
    /// Requested room. Empty means `fallback_room`.
    pub room_name: String,
    pub fallback_room: String,
    pub history_path: PathBuf,
    pub history_capacity: usize,
    pub transport: TransportMeta,
    /// Capacity of each of the outbound, inbound and diagnostic queues.
    pub queue_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            user_name: String::new(),
            room_name: String::new(),
            fallback_room: DEFAULT_ROOM.into(),
            history_path: DEFAULT_HISTORY_PATH.into(),
            history_capacity: MAX_HISTORY_MESSAGES,
            transport: TransportMeta::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RoomConfig {
    pub fn new(user_name: impl Into<String>, room_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            room_name: room_name.into(),
            ..Self::default()
        }
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    pub fn with_transport(mut self, transport: TransportMeta) -> Self {
        self.transport = transport;
        self
    }

    /// The room actually joined: the requested name, or the fallback when
    /// the request is empty. Never empty: a blank fallback resolves to
    /// [`DEFAULT_ROOM`].
    pub fn resolved_room_name(&self) -> &str {
        if !self.room_name.is_empty() {
            &self.room_name
        } else if !self.fallback_room.is_empty() {
            &self.fallback_room
        } else {
            DEFAULT_ROOM
        }
    }

    /// Overlay topic for the resolved room.
    pub fn topic_name(&self) -> String {
        room_topic(self.resolved_room_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_room_resolves_to_fallback_before_topic_derivation() {
        let cfg = RoomConfig::new("alice", "");
        assert_eq!(cfg.resolved_room_name(), "connection");
        assert_eq!(cfg.topic_name(), "room-peerchat-connection");
    }

    #[test]
    fn custom_fallback_is_honoured() {
        let cfg = RoomConfig {
            fallback_room: "lobby".into(),
            ..RoomConfig::new("alice", "")
        };
        assert_eq!(cfg.topic_name(), "room-peerchat-lobby");
    }

    #[test]
    fn blank_fallback_still_resolves_to_a_room() {
        let cfg = RoomConfig {
            fallback_room: String::new(),
            ..RoomConfig::new("alice", "")
        };
        assert_eq!(cfg.resolved_room_name(), "connection");
        assert_eq!(cfg.topic_name(), "room-peerchat-connection");
    }

    #[test]
    fn named_room_is_prefixed() {
        let cfg = RoomConfig::new("alice", "general");
        assert_eq!(cfg.resolved_room_name(), "general");
        assert_eq!(cfg.topic_name(), "room-peerchat-general");
    }

    #[test]
    fn default_transport_carries_placeholders() {
        let meta = TransportMeta::default();
        assert_eq!(meta.ip, "127.0.0.1");
        assert_eq!(meta.port, "8080");
        assert_eq!(meta.signature, "dummySIG");
        assert_eq!(meta.credential_key, "dummyKEY");
        assert_eq!(meta.module_name, "dummyModule");
    }
}
