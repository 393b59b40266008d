//! User priority ladder.
//!
//! Precedence governs cooldown length, lurk-mode bypass, and the critical
//! override. The ladder is totally ordered: Critical > High > Medium >
//! Normal > Low. `Normal` is the default bucket for established users with
//! no standing relationship; it shares the medium cooldown.

use serde::{Deserialize, Serialize};

/// Precedence class for a user, cached per username once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// New or unknown users (fewer than 10 prior messages).
    Low = 0,
    /// Established users with no standing relationship.
    Normal = 1,
    /// Friends (relationship score above the medium threshold).
    Medium = 2,
    /// Moderators and close friends.
    High = 3,
    /// Bot owners; bypasses every rate gate.
    Critical = 4,
}

impl PriorityTier {
    /// Stable label for logs and decision payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Low => "low",
            PriorityTier::Normal => "normal",
            PriorityTier::Medium => "medium",
            PriorityTier::High => "high",
            PriorityTier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(PriorityTier::Critical > PriorityTier::High);
        assert!(PriorityTier::High > PriorityTier::Medium);
        assert!(PriorityTier::Medium > PriorityTier::Normal);
        assert!(PriorityTier::Normal > PriorityTier::Low);
    }

    #[test]
    fn test_labels() {
        assert_eq!(PriorityTier::Critical.as_str(), "critical");
        assert_eq!(PriorityTier::Normal.to_string(), "normal");
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&PriorityTier::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: PriorityTier = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(back, PriorityTier::Critical);
    }
}
