//! Injectable randomness.
//!
//! Every probabilistic branch in the decision components draws through this
//! trait instead of calling the thread RNG inline, so tests can seed the
//! whole pipeline and assert exact outcomes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of randomness for decision components.
pub trait Entropy: Send {
    /// Bernoulli trial: true with probability `p` (clamped to [0, 1]).
    fn chance(&mut self, p: f64) -> bool;

    /// Uniform draw from `[lo, hi)`. Returns `lo` for an empty range.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64;

    /// Uniform index in `[0, n)`. Returns 0 when `n` is 0.
    fn pick(&mut self, n: usize) -> usize;
}

/// Production entropy backed by the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadEntropy;

impl Entropy for ThreadEntropy {
    fn chance(&mut self, p: f64) -> bool {
        rand::thread_rng().gen_bool(p.clamp(0.0, 1.0))
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            lo
        } else {
            rand::thread_rng().gen_range(lo..hi)
        }
    }

    fn pick(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..n)
        }
    }
}

/// Deterministic entropy for tests and reproducible sessions.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Entropy for SeededEntropy {
    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            lo
        } else {
            self.rng.gen_range(lo..hi)
        }
    }

    fn pick(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            self.rng.gen_range(0..n)
        }
    }
}
