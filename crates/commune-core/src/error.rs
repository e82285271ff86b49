use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommuneError {
    // ── Session construction ─────────────────────────────────────────────────
    #[error("could not join topic {topic}: {reason}")]
    Join { topic: String, reason: String },

    // ── Wire ─────────────────────────────────────────────────────────────────
    #[error("malformed envelope: {0}")]
    Codec(String),

    // ── Overlay ──────────────────────────────────────────────────────────────
    #[error("overlay publish failed: {0}")]
    Transport(String),

    #[error("subscription terminated: {0}")]
    SubscriptionClosed(String),

    // ── Session ──────────────────────────────────────────────────────────────
    #[error("room session stopped: {0}")]
    SessionClosed(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CommuneError {
    /// Whether the error belongs to the persistence family (history file
    /// unreadable, unwritable or corrupt).
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Serialization(_))
    }
}
