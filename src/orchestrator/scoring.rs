use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Weight added when any rule triggered.
pub const RULES_WEIGHT: f64 = 0.5;

/// Weight added when the amount is anomalous.
pub const ANOMALY_WEIGHT: f64 = 0.6;

/// Risk score policy for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// 1.0 when any rule triggered, else 0.0
    #[default]
    Binary,

    /// Additive weights capped at 1.0. Without a threshold no amount is anomalous.
    Weighted { anomaly_threshold: Option<Decimal> },
}

impl ScoringPolicy {
    /// Score one assessment in [0, 1].
    pub fn score(&self, rules_triggered: bool, amount: Decimal) -> f64 {
        match self {
            ScoringPolicy::Binary => {
                if rules_triggered {
                    1.0
                } else {
                    0.0
                }
            }
            ScoringPolicy::Weighted { anomaly_threshold } => {
                let mut score = 0.0;
                if rules_triggered {
                    score += RULES_WEIGHT;
                }
                if anomaly_threshold.is_some_and(|t| amount > t) {
                    score += ANOMALY_WEIGHT;
                }
                f64::min(score, 1.0)
            }
        }
    }

    /// Whether `amount` counts as anomalous under this policy.
    pub fn is_anomalous(&self, amount: Decimal) -> bool {
        match self {
            ScoringPolicy::Binary => false,
            ScoringPolicy::Weighted { anomaly_threshold } => {
                anomaly_threshold.is_some_and(|t| amount > t)
            }
        }
    }
}
