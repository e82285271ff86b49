use serde::{Deserialize, Serialize};

use crate::error::CommuneError;

/// A chat message as exchanged over the overlay and kept in history.
///
/// The serde names are the wire tags and must not change: other
/// implementations decode the same JSON. Every field defaults to the empty
/// string so that envelopes missing a tag still decode, and unknown tags
/// are ignored.
///
/// `credential_key` and `signature` are opaque pass-through strings. Nothing
/// in this crate verifies them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEnvelope {
    #[serde(rename = "message")]
    pub body: String,
    /// Textual overlay identity of the author, set by the publishing peer.
    #[serde(rename = "senderid")]
    pub sender_id: String,
    #[serde(rename = "ip")]
    pub origin_ip: String,
    #[serde(rename = "port")]
    pub origin_port: String,
    #[serde(rename = "key")]
    pub credential_key: String,
    pub module_name: String,
    pub signature: String,
}

impl ChatEnvelope {
    /// Serialize to JSON bytes for publishing on a topic.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CommuneError> {
        serde_json::to_vec(self).map_err(|e| CommuneError::Codec(e.to_string()))
    }

    /// Deserialize from bytes received on a topic.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommuneError> {
        serde_json::from_slice(bytes).map_err(|e| CommuneError::Codec(e.to_string()))
    }
}
