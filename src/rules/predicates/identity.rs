use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{ConditionKey, FraudContext, Identity, SubjectId};
use crate::rules::traits::{FraudPatternMatcher, Predicate};
use crate::storage::IdentityDirectory;
use crate::verification::fuzzy;

/// Full-name similarity above which two applicants count as the same person.
pub const DUPLICATE_NAME_THRESHOLD: u8 = 80;

/// Identity record on file for the subject's national id.
pub(crate) async fn identity_for_subject(
    directory: &dyn IdentityDirectory,
    subject_id: SubjectId,
) -> anyhow::Result<Option<Identity>> {
    let Some(applicant) = directory.get_applicant(subject_id).await? else {
        return Ok(None);
    };
    match applicant.national_id {
        Some(nid) if !nid.is_empty() => directory.get_identity(&nid).await,
        _ => Ok(None),
    }
}

/// Same name and gender already registered under a different phone.
pub struct DuplicatePhonePredicate {
    directory: Arc<dyn IdentityDirectory>,
}

impl DuplicatePhonePredicate {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        DuplicatePhonePredicate { directory }
    }
}

#[async_trait]
impl Predicate for DuplicatePhonePredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::DuplicatePhone
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.phone_changed_with_same_name {
            return Ok(flag);
        }

        let Some(applicant) = self.directory.get_applicant(subject_id).await? else {
            return Ok(false);
        };

        let name = applicant.full_name();
        let phone = applicant.normalized_phone();

        let others = self.directory.applicants_by_gender(&applicant.gender).await?;
        let duplicate = others.iter().find(|other| {
            other.subject_id != subject_id
                && other.normalized_phone() != phone
                && fuzzy::ratio(&other.full_name(), &name) > DUPLICATE_NAME_THRESHOLD
        });

        if let Some(other) = duplicate {
            debug!(
                subject_id = %subject_id,
                other_subject_id = %other.subject_id,
                "Similar applicant registered with a different phone"
            );
            return Ok(true);
        }
        Ok(false)
    }
}

/// National id blacklisted, or flagged by a fraud pattern matcher.
pub struct FraudDbMatchPredicate {
    directory: Arc<dyn IdentityDirectory>,
    matcher: Option<Arc<dyn FraudPatternMatcher>>,
}

impl FraudDbMatchPredicate {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        FraudDbMatchPredicate {
            directory,
            matcher: None,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn FraudPatternMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }
}

#[async_trait]
impl Predicate for FraudDbMatchPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::FraudDbMatch
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.matches_fraud_db {
            return Ok(flag);
        }

        let Some(applicant) = self.directory.get_applicant(subject_id).await? else {
            return Ok(false);
        };

        if let Some(nid) = applicant.national_id.as_ref().filter(|n| !n.is_empty()) {
            if self.directory.is_blacklisted(nid).await? {
                return Ok(true);
            }
        }

        match &self.matcher {
            Some(matcher) => matcher.matches(&applicant).await,
            None => Ok(false),
        }
    }
}

/// National id document has expired.
pub struct NidExpiredPredicate {
    directory: Arc<dyn IdentityDirectory>,
}

impl NidExpiredPredicate {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        NidExpiredPredicate { directory }
    }
}

#[async_trait]
impl Predicate for NidExpiredPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::NidExpired
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.nid_expired {
            return Ok(flag);
        }
        Ok(identity_for_subject(self.directory.as_ref(), subject_id)
            .await?
            .is_some_and(|i| i.nid_status.is_expired()))
    }
}

/// National id document has been suspended.
pub struct NidSuspendedPredicate {
    directory: Arc<dyn IdentityDirectory>,
}

impl NidSuspendedPredicate {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        NidSuspendedPredicate { directory }
    }
}

#[async_trait]
impl Predicate for NidSuspendedPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::NidSuspended
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.nid_suspended {
            return Ok(flag);
        }
        Ok(identity_for_subject(self.directory.as_ref(), subject_id)
            .await?
            .is_some_and(|i| i.nid_status.is_suspended()))
    }
}
