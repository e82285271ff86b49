//! commune-history
//!
//! Bounded, file-backed record of the most recent envelopes received in a
//! room. The whole sequence lives in one pretty-printed JSON file, oldest
//! first, and is rewritten on every append.

pub mod store;

pub use store::HistoryStore;
