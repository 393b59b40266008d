//! Per-turn response gates.
//!
//! Three sibling gates sit between the attention layer and the response
//! pipeline: `admission` decides *whether* a response is allowed at all
//! (cooldowns, global caps, load shedding), `pacing` decides *when* it may
//! fire (humanlike delay), and `budget` decides *how richly* it may be
//! generated (which enrichment subsystems run this turn).

pub mod admission;
pub mod budget;
pub mod pacing;

pub use admission::{AdmissionController, AdmissionDecision, AdmissionReason, AdmissionSnapshot};
pub use budget::{BudgetAllocator, BudgetSnapshot, TurnContext};
pub use pacing::{Pace, PaceSnapshot, ResponsePacer};
