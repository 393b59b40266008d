use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub identity: IdentityConfig,
    pub streams: StreamsConfig,
    pub attention: AttentionConfig,
    pub admission: AdmissionConfig,
    pub pacing: PacingConfig,
    pub budget: BudgetConfig,
    pub gateway: Option<GatewayConfig>,
}

impl CadenceConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: CadenceConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CADENCE_BOT_NAME") {
            self.identity.bot_name = v;
        }
        if let Ok(v) = std::env::var("CADENCE_OWNERS") {
            self.identity.owners = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("CADENCE_MAX_RESPONSES_PER_MINUTE") {
            if let Ok(n) = v.parse() {
                self.admission.max_responses_per_minute = n;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_LURK_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.admission.lurk_threshold = n;
            }
        }
        // Gateway env overrides
        if let Ok(host) = std::env::var("CADENCE_GATEWAY_HOST") {
            let port = self
                .gateway
                .as_ref()
                .map(|g| g.port)
                .unwrap_or_else(default_gateway_port);
            self.gateway = Some(GatewayConfig { host, port });
        }
        if let Ok(v) = std::env::var("CADENCE_GATEWAY_PORT") {
            if let Ok(port) = v.parse() {
                let host = self
                    .gateway
                    .as_ref()
                    .map(|g| g.host.clone())
                    .unwrap_or_else(default_gateway_host);
                self.gateway = Some(GatewayConfig { host, port });
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name the bot answers to; mention detection scans text for it.
    pub bot_name: String,
    /// Usernames (lowercase) granted the critical tier unconditionally.
    pub owners: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            bot_name: "cadence".to_string(),
            owners: vec!["cadence_dev".to_string(), "admin".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    /// Platforms registered at startup, in priority order. Registration
    /// order breaks heat ties (first registered wins).
    pub platforms: Vec<String>,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            platforms: vec![
                "voice".to_string(),
                "coolhole".to_string(),
                "discord".to_string(),
                "twitch".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    /// Seconds between heat decay ticks.
    pub decay_interval_secs: u64,
    /// Multiplier applied to every stream's heat each tick.
    pub decay_factor: f64,
    /// Window for counting messages/mentions/participants into heat (ms).
    pub heat_window_ms: i64,
    /// Window for rebuilding a stream's participant set on decay (ms).
    pub participant_window_ms: i64,
    /// Messages retained per stream.
    pub stream_history: usize,
    /// Messages retained in the cross-platform unified log.
    pub unified_capacity: usize,
    /// Heat contributed per recent message.
    pub message_weight: f64,
    /// Extra heat per recent direct mention.
    pub mention_weight: f64,
    /// Heat per unique recent participant.
    pub participant_weight: f64,
    /// Probability of a brief stray reply to a hot non-focused stream.
    pub focus_stray_chance: f64,
    /// Heat a non-focused stream needs before a stray reply is possible.
    pub focus_heat_threshold: f64,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            decay_interval_secs: 10,
            decay_factor: 0.95,
            heat_window_ms: 120_000,
            participant_window_ms: 300_000,
            stream_history: 10,
            unified_capacity: 30,
            message_weight: 5.0,
            mention_weight: 15.0,
            participant_weight: 10.0,
            focus_stray_chance: 0.05,
            focus_heat_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Per-user cooldowns in milliseconds, selected by priority bucket.
    pub cooldown_vip_ms: i64,
    pub cooldown_normal_ms: i64,
    pub cooldown_new_ms: i64,
    pub cooldown_spam_ms: i64,

    /// Hard cap on responses per fixed 60-second window.
    pub max_responses_per_minute: u32,
    /// Minimum spacing between any two responses (ms).
    pub min_time_between_responses_ms: i64,

    /// Chat velocity thresholds (messages per minute).
    pub velocity_slow: u32,
    pub velocity_normal: u32,
    pub velocity_fast: u32,
    pub velocity_overwhelming: u32,

    /// Velocity above this (strictly) enters lurk mode.
    pub lurk_threshold: u32,
    /// Probability of responding to a non-priority user while lurking.
    pub lurk_response_rate: f64,

    /// Spam score above which a user gets the spam cooldown.
    pub spam_score_cutoff: f32,
    /// Users with fewer prior messages than this are "new".
    pub new_user_message_count: u32,
    /// Relationship score thresholds for the high/medium tiers.
    pub relationship_high: f32,
    pub relationship_medium: f32,

    /// Optional TTL for the memoized per-user priority. `None` preserves
    /// the original behavior: a tier is computed once per process lifetime.
    pub priority_cache_ttl_secs: Option<u64>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            cooldown_vip_ms: 5_000,
            cooldown_normal_ms: 15_000,
            cooldown_new_ms: 30_000,
            cooldown_spam_ms: 60_000,

            max_responses_per_minute: 15,
            min_time_between_responses_ms: 2_000,

            velocity_slow: 5,
            velocity_normal: 15,
            velocity_fast: 35,
            velocity_overwhelming: 60,

            lurk_threshold: 60,
            lurk_response_rate: 0.3,

            spam_score_cutoff: 50.0,
            new_user_message_count: 10,
            relationship_high: 50.0,
            relationship_medium: 25.0,

            priority_cache_ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Hard bounds on any computed delay (ms).
    pub minimum_delay_ms: i64,
    pub maximum_delay_ms: i64,
    /// Self-throttle window after the bot's own message (ms).
    pub own_message_cooldown_ms: i64,
    /// Consecutive self-responses before the permissive gate starts rolling.
    pub consecutive_soft_limit: u32,
    /// Response probability once past the soft limit.
    pub consecutive_soft_rate: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            minimum_delay_ms: 800,
            maximum_delay_ms: 12_000,
            own_message_cooldown_ms: 8_000,
            consecutive_soft_limit: 12,
            consecutive_soft_rate: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Enrichment subsystems per tier, listed in affinity order (the first
    /// entries of a tier are the ones kept when the tier's trial fails).
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
    pub background: Vec<String>,

    /// Per-tier trial probabilities.
    pub high_probability: f64,
    pub medium_probability: f64,
    pub low_probability: f64,
    pub background_probability: f64,

    /// Subset sizes drawn when a tier's trial succeeds.
    pub medium_sample: usize,
    pub low_sample: usize,
    pub background_sample: usize,
    /// Floor kept from the high tier even when its trial fails.
    pub high_floor: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            critical: vec![
                "mood_tracker".to_string(),
                "relationship_tracker".to_string(),
                "tone_guard".to_string(),
            ],
            high: vec![
                "memory_recall".to_string(),
                "emotion_model".to_string(),
                "user_callbacks".to_string(),
                "running_gags".to_string(),
                "reputation".to_string(),
            ],
            medium: vec![
                "topic_threads".to_string(),
                "vibe_detection".to_string(),
                "boredom_meter".to_string(),
                "fixations".to_string(),
                "correction_learning".to_string(),
                "thread_awareness".to_string(),
            ],
            low: vec![
                "callback_humor".to_string(),
                "energy_mirroring".to_string(),
                "mood_contagion".to_string(),
                "role_awareness".to_string(),
                "interest_decay".to_string(),
            ],
            background: vec![
                "dream_journal".to_string(),
                "rumor_mill".to_string(),
                "prediction_engine".to_string(),
            ],

            high_probability: 0.8,
            medium_probability: 0.5,
            low_probability: 0.25,
            background_probability: 0.1,

            medium_sample: 3,
            low_sample: 2,
            background_sample: 1,
            high_floor: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8750
}

// ============================================================================
// Tests
// ============================================================================
