use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque rule identifier. Store iteration order is id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Condition key selecting the predicate a rule runs.
///
/// Keys read from storage that match no known predicate become
/// `Unrecognized` and are skipped by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKey {
    /// Subject currently holds an approved or active loan
    ActiveLoan,
    /// Similar name and gender registered under a different phone
    DuplicatePhone,
    /// Two or more applications inside 24 hours
    RapidReapply,
    /// National id on the blacklist or matching a known fraud pattern
    FraudDbMatch,
    /// More than two applications today
    ExcessiveReapply,
    /// TIN registered under a different name
    TinMismatch,
    /// National id KYC data disagrees with the registry
    NidKycMismatch,
    /// National id expired
    NidExpired,
    /// National id suspended
    NidSuspended,
    Unrecognized(String),
}

impl ConditionKey {
    /// Every key with a built-in predicate, in catalogue order.
    pub const KNOWN: [ConditionKey; 9] = [
        ConditionKey::ActiveLoan,
        ConditionKey::DuplicatePhone,
        ConditionKey::RapidReapply,
        ConditionKey::FraudDbMatch,
        ConditionKey::ExcessiveReapply,
        ConditionKey::TinMismatch,
        ConditionKey::NidKycMismatch,
        ConditionKey::NidExpired,
        ConditionKey::NidSuspended,
    ];

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "active_loan" => ConditionKey::ActiveLoan,
            "duplicate_phone" => ConditionKey::DuplicatePhone,
            "rapid_reapply" => ConditionKey::RapidReapply,
            "fraud_db_match" => ConditionKey::FraudDbMatch,
            "excessive_reapply" => ConditionKey::ExcessiveReapply,
            "tin_mismatch" => ConditionKey::TinMismatch,
            "nid_kyc_mismatch" => ConditionKey::NidKycMismatch,
            "nid_expired" => ConditionKey::NidExpired,
            "nid_suspended" => ConditionKey::NidSuspended,
            other => ConditionKey::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConditionKey::ActiveLoan => "active_loan",
            ConditionKey::DuplicatePhone => "duplicate_phone",
            ConditionKey::RapidReapply => "rapid_reapply",
            ConditionKey::FraudDbMatch => "fraud_db_match",
            ConditionKey::ExcessiveReapply => "excessive_reapply",
            ConditionKey::TinMismatch => "tin_mismatch",
            ConditionKey::NidKycMismatch => "nid_kyc_mismatch",
            ConditionKey::NidExpired => "nid_expired",
            ConditionKey::NidSuspended => "nid_suspended",
            ConditionKey::Unrecognized(raw) => raw.as_str(),
        }
    }

    #[inline]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, ConditionKey::Unrecognized(_))
    }
}

impl From<String> for ConditionKey {
    fn from(s: String) -> Self {
        ConditionKey::parse(&s)
    }
}

impl From<&str> for ConditionKey {
    fn from(s: &str) -> Self {
        ConditionKey::parse(s)
    }
}

impl From<ConditionKey> for String {
    fn from(key: ConditionKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored, admin-configurable fraud rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,

    /// Display label
    pub name: String,

    /// Returned verbatim as the fraud reason when the rule triggers
    pub description: String,

    pub condition_key: ConditionKey,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

/// Fields for creating a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub condition_key: ConditionKey,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub condition_key: Option<ConditionKey>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.condition_key.is_none()
            && self.is_active.is_none()
    }

    /// Apply the present fields to a rule.
    pub fn apply_to(&self, rule: &mut Rule) {
        if let Some(name) = &self.name {
            rule.name = name.clone();
        }
        if let Some(description) = &self.description {
            rule.description = description.clone();
        }
        if let Some(key) = &self.condition_key {
            rule.condition_key = key.clone();
        }
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
    }
}

/// Filter for listing rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleFilter {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub condition_key: Option<ConditionKey>,
}

impl RuleFilter {
    pub fn active_only() -> Self {
        RuleFilter {
            active: Some(true),
            condition_key: None,
        }
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        self.active.map_or(true, |a| rule.is_active == a)
            && self
                .condition_key
                .as_ref()
                .map_or(true, |k| &rule.condition_key == k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(active: bool) -> Rule {
        Rule {
            id: RuleId(1),
            name: "Active Loan Check".to_string(),
            description: "Fraud if applicant has active loan".to_string(),
            condition_key: ConditionKey::ActiveLoan,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_condition_key_round_trip_known() {
        for key in ConditionKey::KNOWN.iter() {
            assert_eq!(&ConditionKey::parse(key.as_str()), key);
            assert!(key.is_recognized());
        }
    }

    #[test]
    fn test_unknown_condition_key_is_kept_verbatim() {
        let key: ConditionKey = serde_json::from_str("\"high_amount\"").unwrap();
        assert_eq!(key, ConditionKey::Unrecognized("high_amount".to_string()));
        assert!(!key.is_recognized());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"high_amount\"");
    }

    #[test]
    fn test_partial_update_touches_only_present_fields() {
        let mut r = rule(true);
        let update = RuleUpdate {
            description: Some("changed".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut r);

        assert_eq!(r.description, "changed");
        assert_eq!(r.name, "Active Loan Check");
        assert!(r.is_active);
    }

    #[test]
    fn test_filter_matches() {
        let filter = RuleFilter::active_only();
        assert!(filter.matches(&rule(true)));
        assert!(!filter.matches(&rule(false)));

        let by_key = RuleFilter {
            active: None,
            condition_key: Some(ConditionKey::NidExpired),
        };
        assert!(!by_key.matches(&rule(true)));
    }

    #[test]
    fn test_new_rule_defaults_active() {
        let parsed: NewRule =
            serde_json::from_str(r#"{"name":"x","condition_key":"nid_expired"}"#).unwrap();
        assert!(parsed.is_active);
        assert_eq!(parsed.description, "");
    }
}
