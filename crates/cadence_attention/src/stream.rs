//! Per-stream state and the cross-platform unified log.

use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// One message as retained for heat computation and context building.
#[derive(Debug, Clone, Serialize)]
pub struct StreamMessage {
    pub platform: String,
    pub username: String,
    pub text: String,
    pub timestamp_ms: i64,
    /// Whether the bot was addressed in this message.
    pub mentioned: bool,
}

/// State for one configured platform stream. Created at startup, mutated on
/// every inbound message and decay tick, never destroyed.
#[derive(Debug)]
pub struct PlatformStream {
    pub platform: String,
    /// Conversation heat, always within [0, 100].
    pub heat: f64,
    /// Timestamp of the most recent message (ms), 0 if none yet.
    pub last_message_ms: i64,
    /// Ring buffer of the most recent messages on this stream.
    pub recent: VecDeque<StreamMessage>,
    /// Usernames seen recently; rebuilt from `recent` on every decay tick.
    pub participants: HashSet<String>,
}

impl PlatformStream {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            heat: 0.0,
            last_message_ms: 0,
            recent: VecDeque::new(),
            participants: HashSet::new(),
        }
    }

    /// Append a message, evicting the oldest beyond `history` entries.
    pub fn push(&mut self, msg: StreamMessage, history: usize) {
        self.last_message_ms = msg.timestamp_ms;
        self.participants.insert(msg.username.clone());
        self.recent.push_back(msg);
        while self.recent.len() > history {
            self.recent.pop_front();
        }
    }

    /// Rebuild the participant set from messages inside the window.
    pub fn rebuild_participants(&mut self, now_ms: i64, window_ms: i64) {
        self.participants = self
            .recent
            .iter()
            .filter(|m| now_ms - m.timestamp_ms < window_ms)
            .map(|m| m.username.clone())
            .collect();
    }
}

/// Diagnostic heat snapshot for one stream.
#[derive(Debug, Clone, Serialize)]
pub struct HeatSnapshot {
    pub platform: String,
    pub heat: f64,
    pub participants: usize,
    pub recent_messages: usize,
}

/// Bounded FIFO log of the most recent messages across all streams.
#[derive(Debug)]
pub struct UnifiedLog {
    entries: VecDeque<StreamMessage>,
    capacity: usize,
}

impl UnifiedLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, msg: StreamMessage) {
        self.entries.push_back(msg);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &StreamMessage> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(platform: &str, user: &str, ts: i64) -> StreamMessage {
        StreamMessage {
            platform: platform.to_string(),
            username: user.to_string(),
            text: "hi".to_string(),
            timestamp_ms: ts,
            mentioned: false,
        }
    }

    #[test]
    fn test_stream_ring_evicts_oldest() {
        let mut s = PlatformStream::new("discord");
        for i in 0..15 {
            s.push(msg("discord", "a", i), 10);
        }
        assert_eq!(s.recent.len(), 10);
        assert_eq!(s.recent.front().unwrap().timestamp_ms, 5);
        assert_eq!(s.last_message_ms, 14);
    }

    #[test]
    fn test_rebuild_participants_drops_stale() {
        let mut s = PlatformStream::new("twitch");
        s.push(msg("twitch", "old", 0), 10);
        s.push(msg("twitch", "fresh", 400_000), 10);
        assert_eq!(s.participants.len(), 2);

        s.rebuild_participants(500_000, 300_000);
        assert_eq!(s.participants.len(), 1);
        assert!(s.participants.contains("fresh"));
    }

    #[test]
    fn test_unified_log_fifo() {
        let mut log = UnifiedLog::new(3);
        for i in 0..5 {
            log.push(msg("discord", "a", i));
        }
        assert_eq!(log.len(), 3);
        let ts: Vec<i64> = log.tail(10).map(|m| m.timestamp_ms).collect();
        assert_eq!(ts, vec![2, 3, 4]);
    }

    #[test]
    fn test_unified_log_tail_shorter_than_request() {
        let mut log = UnifiedLog::new(30);
        log.push(msg("voice", "a", 1));
        assert_eq!(log.tail(15).count(), 1);
    }
}
