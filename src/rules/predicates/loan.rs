use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{ConditionKey, FraudContext, SubjectId};
use crate::rules::traits::Predicate;
use crate::storage::LoanHistory;

/// Trailing window for `rapid_reapply`.
pub const RAPID_REAPPLY_WINDOW_HOURS: i64 = 24;

/// Applications inside the window that count as rapid.
pub const RAPID_REAPPLY_MIN: usize = 2;

/// Applications allowed per UTC day before `excessive_reapply` fires.
pub const EXCESSIVE_REAPPLY_LIMIT: u32 = 2;

/// Subject holds an approved or active loan.
pub struct ActiveLoanPredicate {
    loans: Arc<dyn LoanHistory>,
}

impl ActiveLoanPredicate {
    pub fn new(loans: Arc<dyn LoanHistory>) -> Self {
        ActiveLoanPredicate { loans }
    }
}

#[async_trait]
impl Predicate for ActiveLoanPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::ActiveLoan
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.has_active_loan {
            return Ok(flag);
        }
        self.loans.has_active_loan(subject_id).await
    }
}

/// Two or more applications in the last 24 hours.
pub struct RapidReapplyPredicate {
    loans: Arc<dyn LoanHistory>,
}

impl RapidReapplyPredicate {
    pub fn new(loans: Arc<dyn LoanHistory>) -> Self {
        RapidReapplyPredicate { loans }
    }
}

#[async_trait]
impl Predicate for RapidReapplyPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::RapidReapply
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.applied_within_24h {
            return Ok(flag);
        }
        let recent = self
            .loans
            .applications_within_hours(subject_id, RAPID_REAPPLY_WINDOW_HOURS)
            .await?;
        Ok(recent.len() >= RAPID_REAPPLY_MIN)
    }
}

/// More than two applications on the current UTC day.
pub struct ExcessiveReapplyPredicate {
    loans: Arc<dyn LoanHistory>,
}

impl ExcessiveReapplyPredicate {
    pub fn new(loans: Arc<dyn LoanHistory>) -> Self {
        ExcessiveReapplyPredicate { loans }
    }
}

#[async_trait]
impl Predicate for ExcessiveReapplyPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::ExcessiveReapply
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        let count = match ctx.reapply_count_today {
            Some(count) => count,
            None => self.loans.count_applications_today(subject_id).await?,
        };
        Ok(count > EXCESSIVE_REAPPLY_LIMIT)
    }
}
