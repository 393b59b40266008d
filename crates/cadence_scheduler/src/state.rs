//! Owned state for the scheduler loop.

use cadence_attention::HeatTracker;
use cadence_core::CadenceConfig;
use cadence_gates::{AdmissionController, BudgetAllocator, ResponsePacer};
use std::collections::HashMap;

/// Every mutable map the scheduling core needs, owned in one place and
/// borrowed into the component functions. No component keeps its own copy
/// of shared state, and nothing outside the scheduler loop mutates it.
pub struct SchedulerState {
    pub bot_name: String,
    pub attention: HeatTracker,
    pub admission: AdmissionController,
    pub pacer: ResponsePacer,
    pub budget: BudgetAllocator,
    /// Relationship scores fed in from the (external) personality layer.
    pub relationships: HashMap<String, f32>,
}

impl SchedulerState {
    pub fn new(config: &CadenceConfig) -> Self {
        let bot_name = config.identity.bot_name.clone();
        Self {
            attention: HeatTracker::new(
                config.attention.clone(),
                bot_name.clone(),
                &config.streams.platforms,
            ),
            admission: AdmissionController::new(
                config.admission.clone(),
                config.identity.owners.clone(),
            ),
            pacer: ResponsePacer::new(config.pacing.clone(), bot_name.clone()),
            budget: BudgetAllocator::new(config.budget.clone()),
            relationships: HashMap::new(),
            bot_name,
        }
    }

    /// Advance time-based state: heat decay and participant pruning.
    /// Returns `Err` instead of panicking so a bad tick can be logged and
    /// swallowed without stopping the interval.
    pub fn decay_tick(&mut self, now_ms: i64) -> anyhow::Result<()> {
        self.attention.decay_tick(now_ms);
        Ok(())
    }

    pub fn relationship(&self, username: &str) -> f32 {
        self.relationships.get(username).copied().unwrap_or(0.0)
    }
}
