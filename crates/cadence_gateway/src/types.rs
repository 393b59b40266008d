//! Wire types for the gateway.

use cadence_core::InboundMessage;
use serde::Deserialize;

/// Inbound message payload for `POST /message`. Only `platform` is
/// required; everything else degrades to a neutral default.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestMessage {
    pub platform: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    /// Unix milliseconds; filled with the server clock when omitted.
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    #[serde(default)]
    pub is_mentioned: bool,
    #[serde(default)]
    pub is_mod: bool,
    #[serde(default)]
    pub is_vip: bool,
}

impl IngestMessage {
    /// Convert to the scheduler's normalized event.
    pub fn into_inbound(self) -> InboundMessage {
        InboundMessage {
            platform: self.platform,
            username: self.username,
            text: self.text,
            timestamp_ms: self
                .timestamp_ms
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            is_mentioned: self.is_mentioned,
            is_mod: self.is_mod,
            is_vip: self.is_vip,
        }
        .normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_payload_fills_defaults() {
        let msg: IngestMessage =
            serde_json::from_str(r#"{"platform": "twitch"}"#).unwrap();
        let inbound = msg.into_inbound();
        assert_eq!(inbound.platform, "twitch");
        assert_eq!(inbound.username, "anonymous");
        assert_eq!(inbound.text, "");
        assert!(inbound.timestamp_ms > 0);
        assert!(!inbound.is_mentioned);
    }

    #[test]
    fn test_full_payload_preserved() {
        let msg: IngestMessage = serde_json::from_str(
            r#"{
                "platform": "discord",
                "username": "alice",
                "text": "hi cadence",
                "timestamp_ms": 1700000000000,
                "is_mentioned": true,
                "is_mod": true,
                "is_vip": false
            }"#,
        )
        .unwrap();
        let inbound = msg.into_inbound();
        assert_eq!(inbound.username, "alice");
        assert_eq!(inbound.timestamp_ms, 1_700_000_000_000);
        assert!(inbound.is_mentioned);
        assert!(inbound.is_mod);
    }
}
