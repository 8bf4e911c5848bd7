// src/storage/traits.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Applicant, AuditEntry, AuditQuery, AuditRecord, AuditSummary, Gender, Identity, NationalId, NewRule, Rule,
    RuleFilter, RuleId, RuleUpdate, SubjectId,
};

/// Rule definitions, iterated in id order.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_rules(&self, filter: &RuleFilter) -> anyhow::Result<Vec<Rule>>;
    async fn get_rule(&self, id: RuleId) -> anyhow::Result<Option<Rule>>;
    async fn create_rule(&self, rule: &NewRule) -> anyhow::Result<Rule>;

    /// Returns `None` when no rule has this id.
    async fn update_rule(&self, id: RuleId, update: &RuleUpdate) -> anyhow::Result<Option<Rule>>;

    /// Returns `false` when no rule has this id.
    async fn delete_rule(&self, id: RuleId) -> anyhow::Result<bool>;

    /// Flip `is_active` only. Returns `None` when no rule has this id.
    async fn toggle_rule(&self, id: RuleId) -> anyhow::Result<Option<Rule>>;

    async fn count_rules(&self) -> anyhow::Result<usize> {
        Ok(self.list_rules(&RuleFilter::default()).await?.len())
    }
}

/// Identity records, applicants and the national-id blacklist.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_identity(&self, nid: &NationalId) -> anyhow::Result<Option<Identity>>;
    async fn is_blacklisted(&self, nid: &NationalId) -> anyhow::Result<bool>;
    async fn get_applicant(&self, subject_id: SubjectId) -> anyhow::Result<Option<Applicant>>;
    async fn applicants_by_gender(&self, gender: &Gender) -> anyhow::Result<Vec<Applicant>>;
}

/// Loan and application history.
#[async_trait]
pub trait LoanHistory: Send + Sync {
    async fn has_active_loan(&self, subject_id: SubjectId) -> anyhow::Result<bool>;

    /// Applications since 00:00 UTC today.
    async fn count_applications_today(&self, subject_id: SubjectId) -> anyhow::Result<u32>;

    /// Application timestamps in the trailing window, newest first.
    async fn applications_within_hours(
        &self,
        subject_id: SubjectId,
        hours: i64,
    ) -> anyhow::Result<Vec<DateTime<Utc>>>;
}

/// Append-only log of assessments.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<AuditEntry>;

    /// Entries matching the query, newest first.
    async fn list(&self, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>>;

    async fn summary(&self) -> anyhow::Result<AuditSummary> {
        let entries = self.list(&AuditQuery::default()).await?;
        Ok(AuditSummary {
            total: entries.len() as u64,
            fraud: entries.iter().filter(|e| e.is_fraud).count() as u64,
        })
    }
}

/// A backend providing every collaborator.
pub trait Storage: RuleStore + IdentityDirectory + LoanHistory + AuditLog {}

impl<T> Storage for T where T: RuleStore + IdentityDirectory + LoanHistory + AuditLog {}
