use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Per-assessment fraud signals.
///
/// Every field is optional. A present value is trusted by the matching
/// predicate; an absent one makes the predicate compute it live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_active_loan: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_changed_with_same_name: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_within_24h: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches_fraud_db: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reapply_count_today: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tin_name_mismatch: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid_kyc_mismatch: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid_expired: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nid_suspended: Option<bool>,
}

impl FraudContext {
    pub fn new() -> Self {
        FraudContext::default()
    }

    /// Fill `nid_expired`/`nid_suspended` from an identity record.
    ///
    /// Fields already present are left alone.
    pub fn with_identity_status(mut self, identity: &Identity) -> Self {
        self.nid_expired
            .get_or_insert(identity.nid_status.is_expired());
        self.nid_suspended
            .get_or_insert(identity.nid_status.is_suspended());
        self
    }

    /// Overlay `other` on top of `self`; fields present in `other` win.
    pub fn overlay(self, other: &FraudContext) -> Self {
        FraudContext {
            has_active_loan: other.has_active_loan.or(self.has_active_loan),
            phone_changed_with_same_name: other
                .phone_changed_with_same_name
                .or(self.phone_changed_with_same_name),
            applied_within_24h: other.applied_within_24h.or(self.applied_within_24h),
            matches_fraud_db: other.matches_fraud_db.or(self.matches_fraud_db),
            reapply_count_today: other.reapply_count_today.or(self.reapply_count_today),
            tin_name_mismatch: other.tin_name_mismatch.or(self.tin_name_mismatch),
            nid_kyc_mismatch: other.nid_kyc_mismatch.or(self.nid_kyc_mismatch),
            nid_expired: other.nid_expired.or(self.nid_expired),
            nid_suspended: other.nid_suspended.or(self.nid_suspended),
        }
    }
}
