//! The scheduler loop and its public handle.

use crate::directive::{OutboundDirective, SubmitReceipt};
use crate::state::SchedulerState;
use cadence_core::{CadenceConfig, Entropy, InboundMessage};
use cadence_gates::{Pace, TurnContext};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Commands serialized through the scheduler's single queue.
enum Command {
    Message {
        msg: InboundMessage,
        reply: oneshot::Sender<SubmitReceipt>,
    },
    SetFocus(Option<String>),
    SetRelationship {
        username: String,
        score: f32,
    },
    CancelTurn(Uuid),
    Stats(oneshot::Sender<StatsSnapshot>),
    /// Internal: a scheduled delay expired.
    FireTurn(Uuid),
}

/// Aggregated diagnostic snapshot for the dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsSnapshot {
    pub admission: cadence_gates::AdmissionSnapshot,
    pub heat: Vec<cadence_attention::HeatSnapshot>,
    pub pacing: cadence_gates::PaceSnapshot,
    pub budget: cadence_gates::BudgetSnapshot,
    pub pending_turns: usize,
    pub focus: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler command channel closed")]
    ChannelClosed,
}

/// Cloneable handle for feeding the scheduler from adapters and the CLI.
#[derive(Clone)]
pub struct Scheduler {
    cmd_tx: mpsc::Sender<Command>,
}

impl Scheduler {
    /// Submit an inbound message and wait for the gate verdict.
    pub async fn submit(&self, msg: InboundMessage) -> Result<SubmitReceipt, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Message { msg, reply: tx })
            .await
            .map_err(|_| SchedulerError::ChannelClosed)?;
        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Enter (or leave, with `None`) focus mode on one platform.
    pub async fn set_focus(&self, platform: Option<String>) -> Result<(), SchedulerError> {
        self.cmd_tx
            .send(Command::SetFocus(platform))
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Update a user's relationship score from the personality layer.
    pub async fn set_relationship(
        &self,
        username: impl Into<String>,
        score: f32,
    ) -> Result<(), SchedulerError> {
        self.cmd_tx
            .send(Command::SetRelationship {
                username: username.into(),
                score,
            })
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Abort a pending scheduled turn before it fires.
    pub async fn cancel_turn(&self, turn_id: Uuid) -> Result<(), SchedulerError> {
        self.cmd_tx
            .send(Command::CancelTurn(turn_id))
            .await
            .map_err(|_| SchedulerError::ChannelClosed)
    }

    pub async fn stats(&self) -> Result<StatsSnapshot, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Stats(tx))
            .await
            .map_err(|_| SchedulerError::ChannelClosed)?;
        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }
}

/// A scheduled turn waiting for its delay to expire.
struct PendingTurn {
    msg: InboundMessage,
    priority: cadence_core::PriorityTier,
    admission_reason: cadence_gates::AdmissionReason,
    attention_reason: cadence_attention::StreamReason,
    brief: bool,
    delay_ms: i64,
    timer: JoinHandle<()>,
}

/// Start the scheduler. Returns the command handle, the outbound directive
/// stream, and the owner task's join handle.
pub fn spawn(
    config: CadenceConfig,
    entropy: Box<dyn Entropy>,
) -> (Scheduler, mpsc::Receiver<OutboundDirective>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (out_tx, out_rx) = mpsc::channel(64);

    let runtime = Runtime {
        state: SchedulerState::new(&config),
        pending: HashMap::new(),
        focus: None,
        entropy,
        cmd_tx: cmd_tx.clone(),
        out_tx,
    };
    let decay_interval = Duration::from_secs(config.attention.decay_interval_secs.max(1));

    let join = tokio::spawn(runtime.run(cmd_rx, decay_interval));
    (Scheduler { cmd_tx }, out_rx, join)
}

struct Runtime {
    state: SchedulerState,
    pending: HashMap<Uuid, PendingTurn>,
    focus: Option<String>,
    entropy: Box<dyn Entropy>,
    /// Own sender, cloned into delay timers so expiry re-enters the queue.
    cmd_tx: mpsc::Sender<Command>,
    out_tx: mpsc::Sender<OutboundDirective>,
}

impl Runtime {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, decay_every: Duration) {
        let mut ticker = tokio::time::interval(decay_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    // A failed tick is logged and swallowed; the next one
                    // still fires.
                    if let Err(e) = self.state.decay_tick(now_ms) {
                        tracing::error!("decay tick failed: {e:#}");
                    }
                }
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::info!("command channel closed, scheduler stopping");
                        break;
                    };
                    self.handle(cmd);
                }
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Message { msg, reply } => {
                let receipt = self.handle_message(msg);
                let _ = reply.send(receipt);
            }
            Command::SetFocus(platform) => {
                tracing::info!(?platform, "focus changed");
                self.focus = platform;
            }
            Command::SetRelationship { username, score } => {
                self.state.relationships.insert(username, score);
            }
            Command::CancelTurn(turn_id) => {
                if let Some(turn) = self.pending.remove(&turn_id) {
                    turn.timer.abort();
                    tracing::debug!(%turn_id, "pending turn cancelled");
                } else {
                    tracing::debug!(%turn_id, "cancel for unknown or fired turn");
                }
            }
            Command::Stats(reply) => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                let _ = reply.send(StatsSnapshot {
                    admission: self.state.admission.snapshot(),
                    heat: self.state.attention.heat_snapshot(),
                    pacing: self.state.pacer.snapshot(now_ms),
                    budget: self.state.budget.snapshot(),
                    pending_turns: self.pending.len(),
                    focus: self.focus.clone(),
                });
            }
            Command::FireTurn(turn_id) => self.fire_turn(turn_id),
        }
    }

    /// The per-message pipeline: track everything, then walk the gates.
    fn handle_message(&mut self, msg: InboundMessage) -> SubmitReceipt {
        let msg = msg.normalize();
        let now_ms = msg.timestamp_ms;

        // Tracking happens for every message, admitted or not.
        self.state.attention.track_message(&msg);
        self.state.admission.track_message(&msg);
        self.state.pacer.track_message(&msg.username, now_ms);

        let attention = self.state.attention.should_respond_to_stream(
            &msg,
            self.focus.as_deref(),
            self.entropy.as_mut(),
        );
        if !attention.respond {
            tracing::trace!(
                platform = %msg.platform,
                reason = attention.reason.as_str(),
                "attention gate refused"
            );
            return SubmitReceipt::refused("attention", attention.reason.as_str());
        }

        let relationship = self.state.relationship(&msg.username);
        let admission = self.state.admission.should_respond(
            &msg,
            relationship,
            now_ms,
            self.entropy.as_mut(),
        );
        if !admission.allowed {
            tracing::debug!(
                username = %msg.username,
                reason = admission.reason.as_str(),
                "admission refused"
            );
            return SubmitReceipt::refused("admission", admission.reason.as_str());
        }

        if !self.state.pacer.should_respond(&msg, self.entropy.as_mut()) {
            tracing::debug!(username = %msg.username, "pacing gate refused");
            return SubmitReceipt::refused("pacing", "consecutive_limit");
        }

        let delay_ms = self.state.pacer.calculate_delay(&msg, self.entropy.as_mut());

        // Optimistic recording at admission time, never at fire time: an
        // in-flight turn must not let a second burst through the window.
        self.state.admission.record_response(&msg.username, now_ms);
        self.state.pacer.track_response(now_ms);

        let turn_id = Uuid::new_v4();
        let timer_tx = self.cmd_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
            if timer_tx.send(Command::FireTurn(turn_id)).await.is_err() {
                tracing::debug!(%turn_id, "scheduler gone before turn fired");
            }
        });

        tracing::debug!(
            %turn_id,
            delay_ms,
            platform = %msg.platform,
            username = %msg.username,
            priority = admission.priority.as_str(),
            "response scheduled"
        );
        let receipt = SubmitReceipt::scheduled(turn_id, delay_ms, admission.reason.as_str());
        self.pending.insert(
            turn_id,
            PendingTurn {
                msg,
                priority: admission.priority,
                admission_reason: admission.reason,
                attention_reason: attention.reason,
                brief: attention.brief,
                delay_ms,
                timer,
            },
        );
        receipt
    }

    /// A delay expired: compute the enrichment budget now (so it reflects
    /// chat load at fire time) and hand the turn off.
    fn fire_turn(&mut self, turn_id: Uuid) {
        let Some(turn) = self.pending.remove(&turn_id) else {
            tracing::trace!(%turn_id, "fired turn already cancelled");
            return;
        };

        let ctx = TurnContext {
            mentioned: turn.msg.mentions(&self.state.bot_name),
            is_question: turn.msg.is_direct_question(&self.state.bot_name),
            high_activity: self.state.pacer.pace() == Pace::Fast,
        };
        let active_systems = self.state.budget.active_systems(&ctx, self.entropy.as_mut());
        let context = self.state.attention.unified_context();

        let directive = OutboundDirective {
            turn_id,
            platform: turn.msg.platform,
            username: turn.msg.username,
            text: turn.msg.text,
            priority: turn.priority,
            admission_reason: turn.admission_reason,
            attention_reason: turn.attention_reason,
            brief: turn.brief,
            delay_ms: turn.delay_ms,
            active_systems,
            context,
        };

        // The loop never blocks on a slow consumer; a dropped directive is
        // the consumer's loss, counters were already recorded.
        if let Err(e) = self.out_tx.try_send(directive) {
            tracing::warn!(%turn_id, "outbound directive dropped: {e}");
        }
    }
}
