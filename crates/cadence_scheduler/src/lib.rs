//! The scheduling core's single logical owner.
//!
//! One task owns all mutable state (streams, user records, window counters)
//! and serializes every mutation through one command queue: inbound
//! messages, decay ticks, focus changes, cancellations, and stats queries
//! all arrive over the same channel and are handled in order. Scheduled
//! response delays are spawned sleeps that re-enter the queue when they
//! expire, so firing a turn is just another serialized command.

pub mod directive;
pub mod runtime;
pub mod state;

pub use directive::{OutboundDirective, SubmitReceipt};
pub use runtime::{spawn, Scheduler, SchedulerError, StatsSnapshot};
pub use state::SchedulerState;
