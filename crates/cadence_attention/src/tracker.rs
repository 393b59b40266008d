//! Heat tracking and the per-stream attention gate.

use crate::stream::{HeatSnapshot, PlatformStream, StreamMessage, UnifiedLog};
use cadence_core::config::AttentionConfig;
use cadence_core::{Entropy, InboundMessage};
use serde::Serialize;

/// Recency bonus: a message in the last 30s keeps the stream hot.
const RECENCY_HOT_MS: i64 = 30_000;
const RECENCY_HOT_BONUS: f64 = 20.0;
/// Weaker bonus for the last 60s.
const RECENCY_WARM_MS: i64 = 60_000;
const RECENCY_WARM_BONUS: f64 = 10.0;

/// Heat band thresholds for the hottest stream.
const HOT_CERTAIN: f64 = 40.0;
const HOT_MODERATE: f64 = 20.0;
const MODERATE_RATE: f64 = 0.6;
const LOW_RATE: f64 = 0.3;

/// Thresholds for streams competing with the hottest.
const COMPETING_HEAT: f64 = 50.0;
const COMPETING_NEAR_HEAT: f64 = 30.0;
const COMPETING_GAP: f64 = 15.0;
const COMPETING_RATE: f64 = 0.4;
const COLD_FLOOR: f64 = 10.0;
const COLD_RATE: f64 = 0.1;

/// Why the attention gate allowed or refused a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamReason {
    MentionedDuringFocus,
    HotPlatformDuringFocus,
    FocusMode,
    Mentioned,
    HottestPlatform,
    ModerateHeat,
    LowHeat,
    CompetingHeat,
    ColdPlatform,
    TooCold,
    UnknownStream,
}

impl StreamReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamReason::MentionedDuringFocus => "mentioned_during_focus",
            StreamReason::HotPlatformDuringFocus => "hot_platform_during_focus",
            StreamReason::FocusMode => "focus_mode",
            StreamReason::Mentioned => "mentioned",
            StreamReason::HottestPlatform => "hottest_platform",
            StreamReason::ModerateHeat => "moderate_heat",
            StreamReason::LowHeat => "low_heat",
            StreamReason::CompetingHeat => "competing_heat",
            StreamReason::ColdPlatform => "cold_platform",
            StreamReason::TooCold => "too_cold",
            StreamReason::UnknownStream => "unknown_stream",
        }
    }
}

/// Verdict of the attention gate for one message.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreamDecision {
    pub respond: bool,
    pub reason: StreamReason,
    /// Set when the reply should be kept short (stray reply during focus).
    pub brief: bool,
}

impl StreamDecision {
    fn allow(reason: StreamReason) -> Self {
        Self {
            respond: true,
            reason,
            brief: false,
        }
    }

    fn deny(reason: StreamReason) -> Self {
        Self {
            respond: false,
            reason,
            brief: false,
        }
    }
}

/// Tracks decaying conversation heat per stream plus the unified log.
///
/// Streams are registered once at construction; registration order breaks
/// heat ties (first registered wins), which keeps `hottest_stream`
/// deterministic.
pub struct HeatTracker {
    config: AttentionConfig,
    bot_name: String,
    streams: Vec<PlatformStream>,
    unified: UnifiedLog,
}

impl HeatTracker {
    pub fn new(config: AttentionConfig, bot_name: impl Into<String>, platforms: &[String]) -> Self {
        let streams = platforms
            .iter()
            .map(|p| PlatformStream::new(p.clone()))
            .collect();
        let unified = UnifiedLog::new(config.unified_capacity);
        Self {
            config,
            bot_name: bot_name.into(),
            streams,
            unified,
        }
    }

    pub fn stream(&self, platform: &str) -> Option<&PlatformStream> {
        self.streams.iter().find(|s| s.platform == platform)
    }

    fn stream_index(&self, platform: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.platform == platform)
    }

    /// Record an inbound message and recompute its stream's heat.
    /// Messages for unregistered platforms are ignored.
    pub fn track_message(&mut self, msg: &InboundMessage) {
        let Some(idx) = self.stream_index(&msg.platform) else {
            tracing::debug!(platform = %msg.platform, "message for unregistered stream ignored");
            return;
        };

        let entry = StreamMessage {
            platform: msg.platform.clone(),
            username: msg.username.clone(),
            text: msg.text.clone(),
            timestamp_ms: msg.timestamp_ms,
            mentioned: msg.mentions(&self.bot_name),
        };

        self.streams[idx].push(entry.clone(), self.config.stream_history);
        self.unified.push(entry);
        self.recompute_heat(idx, msg.timestamp_ms);

        tracing::trace!(
            platform = %msg.platform,
            heat = self.streams[idx].heat,
            "stream heat updated"
        );
    }

    /// Heat formula: message volume + mentions + unique participants within
    /// the heat window, plus a recency bonus; clamped to [0, 100].
    fn recompute_heat(&mut self, idx: usize, now_ms: i64) {
        let cfg = &self.config;
        let stream = &mut self.streams[idx];

        let in_window = |ts: i64| now_ms - ts < cfg.heat_window_ms;

        let recent_count = stream
            .recent
            .iter()
            .filter(|m| in_window(m.timestamp_ms))
            .count() as f64;
        let mention_count = stream
            .recent
            .iter()
            .filter(|m| m.mentioned && in_window(m.timestamp_ms))
            .count() as f64;
        let unique: std::collections::HashSet<&str> = stream
            .recent
            .iter()
            .filter(|m| in_window(m.timestamp_ms))
            .map(|m| m.username.as_str())
            .collect();

        let mut heat = recent_count * cfg.message_weight
            + mention_count * cfg.mention_weight
            + unique.len() as f64 * cfg.participant_weight;

        let since_last = now_ms - stream.last_message_ms;
        if since_last < RECENCY_HOT_MS {
            heat += RECENCY_HOT_BONUS;
        } else if since_last < RECENCY_WARM_MS {
            heat += RECENCY_WARM_BONUS;
        }

        stream.heat = heat.clamp(0.0, 100.0);
    }

    /// Decay every stream's heat and rebuild participant sets. Fired on a
    /// fixed interval through the scheduler's command queue.
    pub fn decay_tick(&mut self, now_ms: i64) {
        for stream in &mut self.streams {
            stream.heat = (stream.heat * self.config.decay_factor).clamp(0.0, 100.0);
            stream.rebuild_participants(now_ms, self.config.participant_window_ms);
        }
    }

    /// The stream with the highest heat; ties go to the first registered.
    pub fn hottest_stream(&self) -> Option<&PlatformStream> {
        let mut hottest: Option<&PlatformStream> = None;
        for stream in &self.streams {
            match hottest {
                Some(h) if stream.heat > h.heat => hottest = Some(stream),
                None => hottest = Some(stream),
                _ => {}
            }
        }
        hottest
    }

    /// The attention gate: should the bot engage with this stream for this
    /// message? Pure decision apart from the injected entropy draws.
    pub fn should_respond_to_stream(
        &self,
        msg: &InboundMessage,
        focus: Option<&str>,
        entropy: &mut dyn Entropy,
    ) -> StreamDecision {
        let Some(stream) = self.stream(&msg.platform) else {
            return StreamDecision::deny(StreamReason::UnknownStream);
        };
        let mentioned = msg.mentions(&self.bot_name);

        // Focused elsewhere: near-total withdrawal from other streams.
        if let Some(focused) = focus {
            if focused != msg.platform {
                if mentioned {
                    return StreamDecision::allow(StreamReason::MentionedDuringFocus);
                }
                if stream.heat > self.config.focus_heat_threshold
                    && entropy.chance(self.config.focus_stray_chance)
                {
                    return StreamDecision {
                        respond: true,
                        reason: StreamReason::HotPlatformDuringFocus,
                        brief: true,
                    };
                }
                return StreamDecision::deny(StreamReason::FocusMode);
            }
        }

        if mentioned {
            return StreamDecision::allow(StreamReason::Mentioned);
        }

        let hottest_heat = self.hottest_stream().map(|s| s.heat).unwrap_or(0.0);
        let is_hottest = self
            .hottest_stream()
            .map(|s| s.platform == stream.platform)
            .unwrap_or(false);

        if is_hottest {
            if stream.heat > HOT_CERTAIN {
                return StreamDecision::allow(StreamReason::HottestPlatform);
            }
            if stream.heat > HOT_MODERATE {
                return StreamDecision {
                    respond: entropy.chance(MODERATE_RATE),
                    reason: StreamReason::ModerateHeat,
                    brief: false,
                };
            }
            return StreamDecision {
                respond: entropy.chance(LOW_RATE),
                reason: StreamReason::LowHeat,
                brief: false,
            };
        }

        // Not the hottest: engage only when this stream's heat rivals it.
        let gap = hottest_heat - stream.heat;
        if stream.heat > COMPETING_HEAT
            || (stream.heat > COMPETING_NEAR_HEAT && gap < COMPETING_GAP)
        {
            return StreamDecision {
                respond: entropy.chance(COMPETING_RATE),
                reason: StreamReason::CompetingHeat,
                brief: false,
            };
        }
        if stream.heat > COLD_FLOOR {
            return StreamDecision {
                respond: entropy.chance(COLD_RATE),
                reason: StreamReason::ColdPlatform,
                brief: false,
            };
        }
        StreamDecision::deny(StreamReason::TooCold)
    }

    /// Per-stream diagnostic snapshot.
    pub fn heat_snapshot(&self) -> Vec<HeatSnapshot> {
        self.streams
            .iter()
            .map(|s| HeatSnapshot {
                platform: s.platform.clone(),
                heat: s.heat,
                participants: s.participants.len(),
                recent_messages: s.recent.len(),
            })
            .collect()
    }

    /// Render recent cross-stream activity for the response pipeline.
    pub fn unified_context(&self) -> String {
        if self.unified.is_empty() {
            return String::new();
        }
        let mut out = String::from("Recent activity across all streams:\n");
        for m in self.unified.tail(15) {
            out.push_str(&format!("[{}] {}: {}\n", m.platform, m.username, m.text));
        }
        if let Some(hottest) = self.hottest_stream() {
            out.push_str(&format!(
                "Hottest: {} ({:.0} heat)",
                hottest.platform, hottest.heat
            ));
        }
        out
    }

    /// One-liners about what is happening on other, still-warm streams.
    pub fn cross_platform_context(&self, current: &str) -> String {
        let mut lines = Vec::new();
        for stream in &self.streams {
            if stream.platform == current || stream.heat <= HOT_MODERATE {
                continue;
            }
            if let Some(last) = stream.recent.back() {
                lines.push(format!(
                    "[Also on {}] {}: \"{}\"",
                    stream.platform, last.username, last.text
                ));
            }
        }
        lines.join("\n")
    }
}
