pub mod constants;
pub mod envelope;
pub mod error;
pub mod overlay;

pub use constants::*;
pub use envelope::ChatEnvelope;
pub use error::CommuneError;
pub use overlay::{Delivery, Overlay, Subscription, Topic};
