use std::sync::Arc;
use tracing::warn;

use crate::domain::{FraudContext, Identity, SubjectId};
use crate::rules::predicates::loan::{RAPID_REAPPLY_MIN, RAPID_REAPPLY_WINDOW_HOURS};
use crate::storage::LoanHistory;

/// Builds the per-assessment fraud context.
///
/// Loan signals are prefetched here; each one degrades to `false`/`0` when
/// the loan history cannot be read. Signals not set here are computed by
/// their predicates on demand.
pub struct ContextBuilder {
    loans: Arc<dyn LoanHistory>,
}

impl ContextBuilder {
    pub fn new(loans: Arc<dyn LoanHistory>) -> Self {
        ContextBuilder { loans }
    }

    /// Context for `subject_id`, with `supplied` fields taking precedence.
    pub async fn build(
        &self,
        subject_id: SubjectId,
        identity: &Identity,
        supplied: Option<&FraudContext>,
    ) -> FraudContext {
        let supplied = supplied.cloned().unwrap_or_default();
        let mut ctx = FraudContext::new().with_identity_status(identity);

        if supplied.has_active_loan.is_none() {
            ctx.has_active_loan = Some(match self.loans.has_active_loan(subject_id).await {
                Ok(flag) => flag,
                Err(e) => {
                    warn!(subject_id = %subject_id, error = %e, "Active loan lookup failed");
                    false
                }
            });
        }

        if supplied.reapply_count_today.is_none() {
            ctx.reapply_count_today =
                Some(match self.loans.count_applications_today(subject_id).await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(subject_id = %subject_id, error = %e, "Application count lookup failed");
                        0
                    }
                });
        }

        if supplied.applied_within_24h.is_none() {
            ctx.applied_within_24h = Some(
                match self
                    .loans
                    .applications_within_hours(subject_id, RAPID_REAPPLY_WINDOW_HOURS)
                    .await
                {
                    Ok(recent) => recent.len() >= RAPID_REAPPLY_MIN,
                    Err(e) => {
                        warn!(subject_id = %subject_id, error = %e, "Recent application lookup failed");
                        false
                    }
                },
            );
        }

        ctx.overlay(&supplied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Loan, LoanApplication, LoanStatus, NationalId, NidStatus};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;

    struct BrokenLoans;

    #[async_trait]
    impl LoanHistory for BrokenLoans {
        async fn has_active_loan(&self, _subject_id: SubjectId) -> anyhow::Result<bool> {
            anyhow::bail!("connection refused")
        }

        async fn count_applications_today(&self, _subject_id: SubjectId) -> anyhow::Result<u32> {
            anyhow::bail!("connection refused")
        }

        async fn applications_within_hours(
            &self,
            _subject_id: SubjectId,
            _hours: i64,
        ) -> anyhow::Result<Vec<DateTime<Utc>>> {
            anyhow::bail!("connection refused")
        }
    }

    fn identity(status: NidStatus) -> Identity {
        Identity {
            subject_id: SubjectId::new(1),
            name: "Hirut Bekele".to_string(),
            national_id: NationalId::new("234567890123"),
            date_of_birth: Some("1992-07-22".to_string()),
            gender: None,
            nid_status: status,
        }
    }

    #[tokio::test]
    async fn test_prefetches_loan_signals() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_loan(Loan {
            subject_id: SubjectId::new(1),
            amount: Decimal::new(2000, 0),
            status: LoanStatus::Approved,
            is_active: true,
        });
        for minutes in [10, 20] {
            storage.add_application(LoanApplication {
                subject_id: SubjectId::new(1),
                amount: Decimal::new(2000, 0),
                application_date: Utc::now() - Duration::minutes(minutes),
            });
        }

        let ctx = ContextBuilder::new(storage)
            .build(SubjectId::new(1), &identity(NidStatus::Active), None)
            .await;

        assert_eq!(ctx.has_active_loan, Some(true));
        assert_eq!(ctx.applied_within_24h, Some(true));
        assert_eq!(ctx.nid_expired, Some(false));
        assert_eq!(ctx.nid_suspended, Some(false));
        assert!(ctx.phone_changed_with_same_name.is_none());
    }

    #[tokio::test]
    async fn test_supplied_fields_win() {
        let storage = Arc::new(MemoryStorage::new());
        let supplied = FraudContext {
            nid_expired: Some(true),
            has_active_loan: Some(true),
            tin_name_mismatch: Some(false),
            ..Default::default()
        };

        let ctx = ContextBuilder::new(storage)
            .build(SubjectId::new(1), &identity(NidStatus::Active), Some(&supplied))
            .await;

        assert_eq!(ctx.nid_expired, Some(true));
        assert_eq!(ctx.has_active_loan, Some(true));
        assert_eq!(ctx.tin_name_mismatch, Some(false));
        assert_eq!(ctx.reapply_count_today, Some(0));
    }

    #[tokio::test]
    async fn test_loan_failures_degrade() {
        let ctx = ContextBuilder::new(Arc::new(BrokenLoans))
            .build(SubjectId::new(1), &identity(NidStatus::Suspended), None)
            .await;

        assert_eq!(ctx.has_active_loan, Some(false));
        assert_eq!(ctx.reapply_count_today, Some(0));
        assert_eq!(ctx.applied_within_24h, Some(false));
        assert_eq!(ctx.nid_suspended, Some(true));
    }
}
