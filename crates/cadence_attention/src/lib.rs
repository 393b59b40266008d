//! Cross-stream attention: which conversation deserves a reply right now.
//!
//! Every platform stream carries a decaying heat score built from recent
//! message volume, mentions, and participant count. The tracker also keeps a
//! small unified log across all streams for cross-platform context, and
//! answers the attention-gate question for each inbound message.

pub mod stream;
pub mod tracker;

pub use stream::{HeatSnapshot, PlatformStream, StreamMessage, UnifiedLog};
pub use tracker::{HeatTracker, StreamDecision, StreamReason};
