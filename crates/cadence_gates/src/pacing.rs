//! Humanlike response pacing.
//!
//! Computes how long to wait before a scheduled response fires, modeling
//! conversational rhythm: quick for direct questions, slower for general
//! chat, and increasingly reluctant when the bot has been monologuing.
//! This gate is deliberately permissive about *whether* to respond; the
//! admission controller is the primary rate gate.

use cadence_core::config::PacingConfig;
use cadence_core::{Entropy, InboundMessage};
use serde::Serialize;
use std::collections::HashSet;

/// Window for the consecutive-response counter: a gap beyond this resets it.
const CONSECUTIVE_WINDOW_MS: i64 = 60_000;
/// Window for the rolling activity list used to classify pace.
const ACTIVITY_WINDOW_MS: i64 = 60_000;
/// Window for counting concurrent speakers.
const SPEAKERS_WINDOW_MS: i64 = 30_000;
/// A user message inside this window counts as replying to the bot.
const REPLY_WINDOW_MS: i64 = 30_000;
/// Penalty window: the bot responded very recently.
const RECENT_RESPONSE_MS: i64 = 15_000;

/// Conversational pace band, from the rolling one-minute activity count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Slow,
    Normal,
    Fast,
}

impl Pace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Slow => "slow",
            Pace::Normal => "normal",
            Pace::Fast => "fast",
        }
    }
}

/// Diagnostic snapshot of the pacing state.
#[derive(Debug, Clone, Serialize)]
pub struct PaceSnapshot {
    pub pace: Pace,
    pub recent_activity: usize,
    pub consecutive_responses: u32,
    pub speakers_last_30s: usize,
}

pub struct ResponsePacer {
    config: PacingConfig,
    bot_name: String,
    /// Timestamp of the bot's own last response; 0 means never.
    last_response_ms: i64,
    consecutive_responses: u32,
    /// Rolling (username, timestamp) activity within the last minute.
    activity: Vec<(String, i64)>,
    pace: Pace,
}

impl ResponsePacer {
    pub fn new(config: PacingConfig, bot_name: impl Into<String>) -> Self {
        Self {
            config,
            bot_name: bot_name.into(),
            last_response_ms: 0,
            consecutive_responses: 0,
            activity: Vec::new(),
            pace: Pace::Normal,
        }
    }

    /// Compute the delay in milliseconds before a response may fire.
    pub fn calculate_delay(&self, msg: &InboundMessage, entropy: &mut dyn Entropy) -> i64 {
        let ts = msg.timestamp_ms;

        // Category selection, first match wins.
        let (mut base, mut multiplier): (f64, f64) = if msg.is_direct_question(&self.bot_name) {
            (1_500.0, 0.8)
        } else if msg.mentions(&self.bot_name) {
            (2_000.0, 0.9)
        } else if self.pace == Pace::Fast {
            (2_500.0, 0.9)
        } else if self.is_reply_to_self(ts) {
            (3_000.0, 1.0)
        } else {
            // General chat: start slow and add the general-chat reluctance.
            (6_000.0, 1.0 + 0.5)
        };

        // Independent additive penalties.
        let since_response = ts - self.last_response_ms;
        if self.last_response_ms > 0 && since_response < RECENT_RESPONSE_MS {
            multiplier += 1.5;
        }
        if self.consecutive_responses >= 2 {
            multiplier += 2.0;
        }
        if self.consecutive_responses >= 3 {
            multiplier += 3.0;
        }
        if self.unique_speakers(ts, SPEAKERS_WINDOW_MS) >= 3 {
            multiplier += 1.2;
        }

        // Still inside the post-message cooldown: stretch the base too.
        if self.last_response_ms > 0 && since_response < self.config.own_message_cooldown_ms {
            let remaining = self.config.own_message_cooldown_ms - since_response;
            base = base.max(remaining as f64 / 2.0);
            multiplier += 1.0;
        }

        let jitter = entropy.uniform(0.8, 1.2);
        let delay = (base * multiplier * jitter).clamp(
            self.config.minimum_delay_ms as f64,
            self.config.maximum_delay_ms as f64,
        );
        delay.floor() as i64
    }

    /// Coarse pacing override: only sustained monologuing dents it.
    pub fn should_respond(&self, msg: &InboundMessage, entropy: &mut dyn Entropy) -> bool {
        if msg.is_direct_question(&self.bot_name) || msg.mentions(&self.bot_name) {
            return true;
        }
        if self.consecutive_responses >= self.config.consecutive_soft_limit {
            return entropy.chance(self.config.consecutive_soft_rate);
        }
        true
    }

    /// Record inbound chat activity and refresh the pace band.
    pub fn track_message(&mut self, username: &str, timestamp_ms: i64) {
        self.activity.push((username.to_string(), timestamp_ms));
        self.activity
            .retain(|(_, ts)| timestamp_ms - ts < ACTIVITY_WINDOW_MS);

        let count = self.activity.len();
        self.pace = if count > 15 {
            Pace::Fast
        } else if count > 5 {
            Pace::Normal
        } else {
            Pace::Slow
        };
    }

    /// Record one of the bot's own responses.
    pub fn track_response(&mut self, timestamp_ms: i64) {
        if self.last_response_ms > 0
            && timestamp_ms - self.last_response_ms < CONSECUTIVE_WINDOW_MS
        {
            self.consecutive_responses += 1;
        } else {
            self.consecutive_responses = 1;
        }
        self.last_response_ms = timestamp_ms;

        // The bot is a participant too.
        let name = self.bot_name.clone();
        self.track_message(&name, timestamp_ms);
    }

    pub fn reset_consecutive(&mut self) {
        self.consecutive_responses = 0;
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }

    pub fn consecutive_responses(&self) -> u32 {
        self.consecutive_responses
    }

    fn is_reply_to_self(&self, now_ms: i64) -> bool {
        self.last_response_ms > 0 && now_ms - self.last_response_ms < REPLY_WINDOW_MS
    }

    fn unique_speakers(&self, now_ms: i64, window_ms: i64) -> usize {
        self.activity
            .iter()
            .filter(|(_, ts)| now_ms - ts < window_ms)
            .map(|(name, _)| name.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn snapshot(&self, now_ms: i64) -> PaceSnapshot {
        PaceSnapshot {
            pace: self.pace,
            recent_activity: self.activity.len(),
            consecutive_responses: self.consecutive_responses,
            speakers_last_30s: self.unique_speakers(now_ms, SPEAKERS_WINDOW_MS),
        }
    }
}
