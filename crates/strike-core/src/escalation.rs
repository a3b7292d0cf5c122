//! Escalation engine
//!
//! Pure decision logic run once per ledger append, on the count that append
//! returned. Severity grows with the count; demotion fires only on the exact
//! threshold so a member already past it is never demoted twice.

use serde::{Deserialize, Serialize};

/// Warning count at which demotion fires
pub const DEFAULT_DEMOTION_THRESHOLD: usize = 3;

/// Severity class of a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// First warning
    Low,
    /// One short of the threshold
    Medium,
    /// At or past the threshold
    High,
}

impl Severity {
    /// Card color for this severity
    #[inline]
    #[must_use]
    pub fn color(self) -> u32 {
        match self {
            Severity::Low => 0x00FF_FF00,
            Severity::Medium => 0x00FF_A500,
            Severity::High => 0x00FF_0000,
        }
    }
}

/// Outcome of evaluating a post-append warning count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
    /// Ordinal of the warning just issued
    pub tier: usize,
    /// Severity class
    pub severity: Severity,
    /// Whether this append crossed the demotion threshold
    pub triggers_demotion: bool,
}

/// Escalation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Count at which demotion fires (exact match)
    pub demotion_threshold: usize,
}

impl EscalationPolicy {
    /// Create policy with a custom threshold
    ///
    /// A threshold of zero is raised to one: the engine only sees counts
    /// returned by an append.
    #[inline]
    #[must_use]
    pub fn new(demotion_threshold: usize) -> Self {
        Self {
            demotion_threshold: demotion_threshold.max(1),
        }
    }

    /// Evaluate the count returned by an append
    #[must_use]
    pub fn evaluate(&self, count: usize) -> EscalationDecision {
        let threshold = self.demotion_threshold;
        let severity = if count >= threshold {
            Severity::High
        } else if count > 0 && count + 1 == threshold {
            Severity::Medium
        } else {
            Severity::Low
        };

        EscalationDecision {
            tier: count,
            severity,
            triggers_demotion: count == threshold,
        }
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEMOTION_THRESHOLD)
    }
}

/// Evaluate a count under the default policy
#[inline]
#[must_use]
pub fn evaluate(count: usize) -> EscalationDecision {
    EscalationPolicy::default().evaluate(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tier_mapping() {
        assert_eq!(evaluate(1).severity, Severity::Low);
        assert_eq!(evaluate(2).severity, Severity::Medium);
        assert_eq!(evaluate(3).severity, Severity::High);
        assert_eq!(evaluate(12).severity, Severity::High);
    }

    #[test]
    fn demotion_only_on_threshold() {
        assert!(!evaluate(1).triggers_demotion);
        assert!(!evaluate(2).triggers_demotion);
        assert!(evaluate(3).triggers_demotion);
        assert!(!evaluate(4).triggers_demotion);
    }

    #[test]
    fn colors() {
        assert_eq!(Severity::Low.color(), 0xFFFF00);
        assert_eq!(Severity::Medium.color(), 0xFFA500);
        assert_eq!(Severity::High.color(), 0xFF0000);
    }

    #[test]
    fn custom_threshold() {
        let policy = EscalationPolicy::new(5);
        assert_eq!(policy.evaluate(3).severity, Severity::Low);
        assert_eq!(policy.evaluate(4).severity, Severity::Medium);
        assert!(policy.evaluate(5).triggers_demotion);
        assert_eq!(EscalationPolicy::new(0).demotion_threshold, 1);
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_pure(count in 0usize..10_000) {
            prop_assert_eq!(evaluate(count), evaluate(count));
        }

        #[test]
        fn prop_demotion_iff_threshold(count in 0usize..10_000) {
            prop_assert_eq!(evaluate(count).triggers_demotion, count == DEFAULT_DEMOTION_THRESHOLD);
        }

        #[test]
        fn prop_tier_tracks_count(count in 1usize..10_000) {
            let decision = evaluate(count);
            prop_assert_eq!(decision.tier, count);
            prop_assert_eq!(decision.severity == Severity::High, count >= 3);
        }
    }
}
