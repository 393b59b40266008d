//! Per-turn enrichment budget.
//!
//! A fixed catalog of response-enrichment subsystems is partitioned into
//! five tiers. Critical systems always run; each lower tier gets one
//! Bernoulli trial per turn, and on success contributes a small random
//! subset. Under heavy chat the lower tiers are damped so the per-turn
//! cost stays bounded.

use cadence_core::config::BudgetConfig;
use cadence_core::Entropy;
use serde::Serialize;

/// What the allocator needs to know about the current turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnContext {
    pub mentioned: bool,
    pub is_question: bool,
    /// Chat is running fast; shed optional load.
    pub high_activity: bool,
}

/// Allocation counters for the dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BudgetSnapshot {
    pub turns_processed: u64,
    pub systems_skipped: u64,
}

pub struct BudgetAllocator {
    config: BudgetConfig,
    turns_processed: u64,
    systems_skipped: u64,
}

impl BudgetAllocator {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            turns_processed: 0,
            systems_skipped: 0,
        }
    }

    /// Select the enrichment subsystems allowed to run this turn.
    ///
    /// Always contains every critical system, and at least the two
    /// highest-affinity high-tier systems whatever the draws do.
    pub fn active_systems(&mut self, ctx: &TurnContext, entropy: &mut dyn Entropy) -> Vec<String> {
        let cfg = &self.config;
        let mut active: Vec<String> = cfg.critical.clone();

        let mut high_p = cfg.high_probability;
        let mut medium_p = cfg.medium_probability;
        let mut low_p = cfg.low_probability;
        let mut background_p = cfg.background_probability;

        // Direct engagement deserves a richer turn.
        if ctx.mentioned || ctx.is_question {
            high_p = 1.0;
            medium_p = 0.8;
            low_p = 0.5;
        }

        // Busy chat: shed optional load.
        if ctx.high_activity {
            medium_p *= 0.5;
            low_p *= 0.3;
            background_p *= 0.1;
        }

        if entropy.chance(high_p) {
            active.extend(cfg.high.iter().cloned());
        } else {
            // Floor: the leading (highest-affinity) pair still runs.
            active.extend(cfg.high.iter().take(cfg.high_floor).cloned());
        }

        if entropy.chance(medium_p) {
            active.extend(sample(&cfg.medium, cfg.medium_sample, entropy));
        }
        if entropy.chance(low_p) {
            active.extend(sample(&cfg.low, cfg.low_sample, entropy));
        }
        if entropy.chance(background_p) {
            active.extend(sample(&cfg.background, cfg.background_sample, entropy));
        }

        let total = self.catalog_size();
        self.turns_processed += 1;
        self.systems_skipped += (total - active.len()) as u64;
        tracing::debug!(
            active = active.len(),
            total,
            "enrichment budget selected"
        );

        active
    }

    fn catalog_size(&self) -> usize {
        let cfg = &self.config;
        cfg.critical.len() + cfg.high.len() + cfg.medium.len() + cfg.low.len() + cfg.background.len()
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            turns_processed: self.turns_processed,
            systems_skipped: self.systems_skipped,
        }
    }
}

/// Draw `k` distinct items from `items` via a partial Fisher-Yates shuffle.
fn sample(items: &[String], k: usize, entropy: &mut dyn Entropy) -> Vec<String> {
    if items.len() <= k {
        return items.to_vec();
    }
    let mut pool: Vec<&String> = items.iter().collect();
    for i in 0..k {
        let j = i + entropy.pick(pool.len() - i);
        pool.swap(i, j);
    }
    pool[..k].iter().map(|s| (*s).clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::SeededEntropy;

    /// Entropy double that records every trial probability it is asked for.
    struct TrialLog {
        verdict: bool,
        probs: Vec<f64>,
    }

    impl TrialLog {
        fn new(verdict: bool) -> Self {
            Self {
                verdict,
                probs: Vec::new(),
            }
        }
    }

    impl Entropy for TrialLog {
        fn chance(&mut self, p: f64) -> bool {
            self.probs.push(p);
            self.verdict
        }
        fn uniform(&mut self, lo: f64, _hi: f64) -> f64 {
            lo
        }
        fn pick(&mut self, _n: usize) -> usize {
            0
        }
    }

    fn allocator() -> BudgetAllocator {
        BudgetAllocator::new(BudgetConfig::default())
    }

    fn approx(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_critical_always_present() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(false);
        let active = alloc.active_systems(&TurnContext::default(), &mut e);
        for name in &BudgetConfig::default().critical {
            assert!(active.contains(name), "missing critical system {}", name);
        }
    }

    #[test]
    fn test_high_floor_survives_failed_trial() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(false);
        let active = alloc.active_systems(&TurnContext::default(), &mut e);

        let cfg = BudgetConfig::default();
        let high_count = active.iter().filter(|s| cfg.high.contains(s)).count();
        assert_eq!(high_count, 2);
        // Specifically the leading pair, in affinity order.
        assert!(active.contains(&cfg.high[0]));
        assert!(active.contains(&cfg.high[1]));
    }

    #[test]
    fn test_all_trials_pass_yields_full_high_and_samples() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(true);
        let active = alloc.active_systems(&TurnContext::default(), &mut e);

        let cfg = BudgetConfig::default();
        let high = active.iter().filter(|s| cfg.high.contains(s)).count();
        let medium = active.iter().filter(|s| cfg.medium.contains(s)).count();
        let low = active.iter().filter(|s| cfg.low.contains(s)).count();
        let background = active.iter().filter(|s| cfg.background.contains(s)).count();

        assert_eq!(high, cfg.high.len());
        assert_eq!(medium, 3);
        assert_eq!(low, 2);
        assert_eq!(background, 1);
    }

    #[test]
    fn test_baseline_trial_probabilities() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(true);
        let _ = alloc.active_systems(&TurnContext::default(), &mut e);
        assert!(approx(&e.probs, &[0.8, 0.5, 0.25, 0.1]), "{:?}", e.probs);
    }

    #[test]
    fn test_mention_raises_probabilities() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(true);
        let ctx = TurnContext {
            mentioned: true,
            ..Default::default()
        };
        let _ = alloc.active_systems(&ctx, &mut e);
        assert!(approx(&e.probs, &[1.0, 0.8, 0.5, 0.1]), "{:?}", e.probs);
    }

    #[test]
    fn test_high_activity_damps_lower_tiers() {
        // Plain message under high activity: medium halves to 0.25, low
        // drops to 0.075, background to 0.01.
        let mut alloc = allocator();
        let mut e = TrialLog::new(true);
        let ctx = TurnContext {
            high_activity: true,
            ..Default::default()
        };
        let _ = alloc.active_systems(&ctx, &mut e);
        assert!(approx(&e.probs, &[0.8, 0.25, 0.075, 0.01]), "{:?}", e.probs);
    }

    #[test]
    fn test_mention_and_high_activity_compose() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(true);
        let ctx = TurnContext {
            mentioned: true,
            high_activity: true,
            ..Default::default()
        };
        let _ = alloc.active_systems(&ctx, &mut e);
        assert!(approx(&e.probs, &[1.0, 0.4, 0.15, 0.01]), "{:?}", e.probs);
    }

    #[test]
    fn test_sampled_subsets_are_distinct() {
        let mut e = SeededEntropy::new(7);
        let items: Vec<String> = (0..6).map(|i| format!("sys{}", i)).collect();
        for _ in 0..100 {
            let picked = sample(&items, 3, &mut e);
            assert_eq!(picked.len(), 3);
            let unique: std::collections::HashSet<&String> = picked.iter().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_sample_short_tier_returns_all() {
        let mut e = SeededEntropy::new(7);
        let items = vec!["a".to_string(), "b".to_string()];
        let picked = sample(&items, 5, &mut e);
        assert_eq!(picked, items);
    }

    #[test]
    fn test_empty_tiers_contribute_nothing() {
        let config = BudgetConfig {
            critical: vec![],
            high: vec![],
            medium: vec![],
            low: vec![],
            background: vec![],
            ..Default::default()
        };
        let mut alloc = BudgetAllocator::new(config);
        let mut e = TrialLog::new(true);
        let active = alloc.active_systems(&TurnContext::default(), &mut e);
        assert!(active.is_empty());
    }

    #[test]
    fn test_skip_accounting() {
        let mut alloc = allocator();
        let mut e = TrialLog::new(false);
        let active = alloc.active_systems(&TurnContext::default(), &mut e);

        let snap = alloc.snapshot();
        let total = BudgetConfig::default().critical.len()
            + BudgetConfig::default().high.len()
            + BudgetConfig::default().medium.len()
            + BudgetConfig::default().low.len()
            + BudgetConfig::default().background.len();
        assert_eq!(snap.turns_processed, 1);
        assert_eq!(snap.systems_skipped, (total - active.len()) as u64);
    }

    #[test]
    fn test_statistical_tier_rates() {
        // Over many seeded turns the medium tier should appear at roughly
        // its configured probability.
        let mut alloc = allocator();
        let mut e = SeededEntropy::new(99);
        let cfg = BudgetConfig::default();
        let turns = 2_000;
        let with_medium = (0..turns)
            .filter(|_| {
                let active = alloc.active_systems(&TurnContext::default(), &mut e);
                active.iter().any(|s| cfg.medium.contains(s))
            })
            .count();
        let rate = with_medium as f64 / turns as f64;
        assert!((0.45..0.55).contains(&rate), "medium rate {}", rate);
    }
}
