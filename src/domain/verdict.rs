use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::rule::{ConditionKey, RuleId};

/// Reason returned to callers when nothing triggered.
pub const APPROVED_REASON: &str = "Approved";

/// Reason stored in the audit log when nothing triggered.
pub const AUDIT_CLEAN_REASON: &str = "None";

/// Gate reason: no identity on file for the national id.
pub const IDENTITY_NOT_VERIFIED: &str = "Identity not verified";

/// Gate reason: national id is on the blacklist.
pub const NATIONAL_ID_BLACKLISTED: &str = "National ID blacklisted";

/// Reason used when the rule store could not be read.
pub const RULES_UNAVAILABLE: &str = "Rule evaluation unavailable";

/// Separator between triggered rule descriptions.
pub const REASON_SEPARATOR: &str = "; ";

/// A rule that triggered during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: RuleId,
    pub condition_key: ConditionKey,
    pub description: String,
}

/// Result of running the rule engine for one subject.
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome {
    /// Triggered rules in rule store order
    pub triggered: SmallVec<[TriggeredRule; 4]>,

    /// Rules whose predicate returned an error
    pub failed: Vec<RuleId>,

    /// Rules whose condition key had no registered predicate
    pub skipped: Vec<RuleId>,

    /// Number of predicates actually invoked
    pub evaluated: usize,
}

impl EngineOutcome {
    #[inline]
    pub fn is_fraud(&self) -> bool {
        !self.triggered.is_empty()
    }

    /// Triggered descriptions joined by `"; "`, empty when none.
    pub fn reason(&self) -> String {
        self.triggered
            .iter()
            .map(|t| t.description.as_str())
            .collect::<Vec<_>>()
            .join(REASON_SEPARATOR)
    }
}

/// Final fraud decision for one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_fraud: bool,
    pub reason: String,
    pub risk_score: f64,
}

impl Verdict {
    /// Terminal verdict from a gate.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Verdict {
            is_fraud: true,
            reason: reason.into(),
            risk_score: 1.0,
        }
    }

    /// Verdict after rule evaluation.
    pub fn from_rules(is_fraud: bool, reason: String, risk_score: f64) -> Self {
        let reason = if reason.is_empty() {
            APPROVED_REASON.to_string()
        } else {
            reason
        };

        Verdict {
            is_fraud,
            reason,
            risk_score: risk_score.clamp(0.0, 1.0),
        }
    }

    pub fn is_approved(&self) -> bool {
        !self.is_fraud
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fraud {
            write!(f, "FRAUD ({:.2}): {}", self.risk_score, self.reason)
        } else {
            write!(f, "APPROVED ({:.2})", self.risk_score)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn triggered(id: i64, description: &str) -> TriggeredRule {
        TriggeredRule {
            rule_id: RuleId(id),
            condition_key: ConditionKey::ActiveLoan,
            description: description.to_string(),
        }
    }

    #[test]
    fn test_outcome_reason_joins_in_order() {
        let outcome = EngineOutcome {
            triggered: smallvec![triggered(1, "first"), triggered(2, "second")],
            ..Default::default()
        };

        assert!(outcome.is_fraud());
        assert_eq!(outcome.reason(), "first; second");
    }

    #[test]
    fn test_empty_outcome_has_empty_reason() {
        let outcome = EngineOutcome::default();
        assert!(!outcome.is_fraud());
        assert_eq!(outcome.reason(), "");
    }

    #[test]
    fn test_clean_verdict_uses_sentinel() {
        let verdict = Verdict::from_rules(false, String::new(), 0.0);
        assert_eq!(verdict.reason, APPROVED_REASON);
        assert!(verdict.is_approved());
    }

    #[test]
    fn test_gate_verdict() {
        let verdict = Verdict::rejected(IDENTITY_NOT_VERIFIED);
        assert!(verdict.is_fraud);
        assert_eq!(verdict.risk_score, 1.0);
    }

    #[test]
    fn test_score_is_clamped() {
        let verdict = Verdict::from_rules(true, "x".to_string(), 1.7);
        assert_eq!(verdict.risk_score, 1.0);
    }
}
