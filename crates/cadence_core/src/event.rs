//! Normalized inbound chat events.
//!
//! Platform adapters (out of scope here) reduce every message to this shape
//! before it enters the scheduler. Malformed input degrades to safe neutral
//! values rather than erroring: an empty username becomes an anonymous
//! low-priority user, empty text is simply a non-mentioning message.

use serde::{Deserialize, Serialize};

/// Fallback author for messages that arrive without a username.
pub const ANONYMOUS_USER: &str = "anonymous";

/// A message event from any platform, already normalized by its adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform identifier: "voice", "coolhole", "discord", "twitch", ...
    pub platform: String,
    pub username: String,
    pub text: String,
    /// Arrival time in Unix milliseconds. All decision components take time
    /// from the event rather than the wall clock.
    pub timestamp_ms: i64,
    /// The adapter resolved a direct mention (reply, @-tag, voice address).
    #[serde(default)]
    pub is_mentioned: bool,
    #[serde(default)]
    pub is_mod: bool,
    #[serde(default)]
    pub is_vip: bool,
}

impl InboundMessage {
    /// Replace missing fields with neutral defaults.
    pub fn normalize(mut self) -> Self {
        if self.username.trim().is_empty() {
            self.username = ANONYMOUS_USER.to_string();
        }
        self
    }

    /// True when the bot is addressed: either the adapter flagged a mention
    /// or the bot's name appears in the text (case-insensitive).
    pub fn mentions(&self, bot_name: &str) -> bool {
        if self.is_mentioned {
            return true;
        }
        if bot_name.is_empty() || self.text.is_empty() {
            return false;
        }
        self.text.to_lowercase().contains(&bot_name.to_lowercase())
    }

    /// A question aimed at the bot: contains `?` and addresses it.
    pub fn is_direct_question(&self, bot_name: &str) -> bool {
        self.text.contains('?') && self.mentions(bot_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> InboundMessage {
        InboundMessage {
            platform: "discord".to_string(),
            username: "alice".to_string(),
            text: text.to_string(),
            timestamp_ms: 1_000,
            is_mentioned: false,
            is_mod: false,
            is_vip: false,
        }
    }

    #[test]
    fn test_normalize_empty_username() {
        let mut m = msg("hello");
        m.username = "   ".to_string();
        let m = m.normalize();
        assert_eq!(m.username, ANONYMOUS_USER);
    }

    #[test]
    fn test_normalize_keeps_empty_text() {
        let mut m = msg("");
        m.username = "bob".to_string();
        let m = m.normalize();
        assert_eq!(m.text, "");
        assert!(!m.mentions("cadence"));
    }

    #[test]
    fn test_mentions_by_name_case_insensitive() {
        assert!(msg("hey Cadence, you there").mentions("cadence"));
        assert!(!msg("hey everyone").mentions("cadence"));
    }

    #[test]
    fn test_mentions_by_adapter_flag() {
        let mut m = msg("no name in text");
        m.is_mentioned = true;
        assert!(m.mentions("cadence"));
    }

    #[test]
    fn test_direct_question_needs_both() {
        assert!(msg("cadence what do you think?").is_direct_question("cadence"));
        assert!(!msg("what do you think?").is_direct_question("cadence"));
        assert!(!msg("cadence that was great").is_direct_question("cadence"));
    }

    #[test]
    fn test_empty_bot_name_never_mentions() {
        assert!(!msg("anything at all").mentions(""));
    }
}
