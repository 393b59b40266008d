//! Shared vocabulary for the Cadence scheduling core.
//!
//! Everything the decision components agree on lives here: the normalized
//! inbound message event, the user priority ladder, the injectable entropy
//! source, and the configuration tree supplied at construction time.

pub mod config;
pub mod entropy;
pub mod event;
pub mod priority;

pub use config::CadenceConfig;
pub use entropy::{Entropy, SeededEntropy, ThreadEntropy};
pub use event::InboundMessage;
pub use priority::PriorityTier;
