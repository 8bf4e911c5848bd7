use async_trait::async_trait;

use crate::domain::{Applicant, ConditionKey, FraudContext, SubjectId};

/// A boolean fraud check registered under a condition key.
///
/// Predicates read the context field they own first and trust it when
/// present. Otherwise they compute the signal from the collaborators they
/// were constructed with. They never mutate rule or audit data.
///
/// An `Err` means a collaborator could not be reached. The engine logs it
/// and treats the rule as not triggered.
#[async_trait]
pub trait Predicate: Send + Sync {
    /// Condition key this predicate answers.
    fn key(&self) -> ConditionKey;

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool>;
}

/// Cross-subject fraud pattern check consulted by `fraud_db_match`.
#[async_trait]
pub trait FraudPatternMatcher: Send + Sync {
    async fn matches(&self, applicant: &Applicant) -> anyhow::Result<bool>;
}
