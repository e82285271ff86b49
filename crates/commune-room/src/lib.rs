//! commune-room
//!
//! The room message engine. `RoomSession::join` joins one room topic on an
//! overlay and starts two tokio tasks:
//!
//!   publish worker   — outbound text → envelope → JSON → topic.publish
//!   subscribe worker — subscription.next → self-echo filter → JSON →
//!                      inbound queue + history file
//!
//! Both stop when the session's cancellation token fires. Failures other than
//! the subscription ending are reported on the diagnostic queue and the
//! offending message is dropped.

pub mod config;
pub mod diagnostics;
pub mod session;

mod publish;
mod subscribe;

pub use config::{RoomConfig, TransportMeta};
pub use diagnostics::{ChatLog, LogTag};
pub use session::RoomSession;
