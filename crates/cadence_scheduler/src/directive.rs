//! What the scheduler hands to the outside world.

use cadence_attention::StreamReason;
use cadence_core::PriorityTier;
use cadence_gates::AdmissionReason;
use serde::Serialize;
use uuid::Uuid;

/// A fully admitted, delayed, budgeted turn, ready for the (external)
/// response pipeline. Emitted on the outbound channel when a scheduled
/// delay expires.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundDirective {
    pub turn_id: Uuid,
    pub platform: String,
    pub username: String,
    /// Text of the message being responded to.
    pub text: String,
    pub priority: PriorityTier,
    pub admission_reason: AdmissionReason,
    pub attention_reason: StreamReason,
    /// Keep the reply short (stray reply while focused elsewhere).
    pub brief: bool,
    /// The delay that was applied before this directive fired.
    pub delay_ms: i64,
    /// Enrichment subsystems allowed to run for this turn.
    pub active_systems: Vec<String>,
    /// Rendered cross-stream conversation context.
    pub context: String,
}

/// Immediate answer to a submitted message: either the turn was scheduled
/// (with its cancellation id) or the stage and reason that refused it.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub scheduled: bool,
    /// Cancellation handle for the pending turn, when scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<i64>,
    /// Which gate produced the verdict: attention, admission, pacing.
    pub stage: &'static str,
    /// Reason code from that gate.
    pub reason: &'static str,
}

impl SubmitReceipt {
    pub fn scheduled(turn_id: Uuid, delay_ms: i64, reason: &'static str) -> Self {
        Self {
            scheduled: true,
            turn_id: Some(turn_id),
            delay_ms: Some(delay_ms),
            stage: "scheduled",
            reason,
        }
    }

    pub fn refused(stage: &'static str, reason: &'static str) -> Self {
        Self {
            scheduled: false,
            turn_id: None,
            delay_ms: None,
            stage,
            reason,
        }
    }
}
