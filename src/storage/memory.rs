// src/storage/memory.rs
use ahash::AHashMap;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::{
    Applicant, AuditEntry, AuditQuery, AuditRecord, Gender, Identity, Loan, LoanApplication,
    NationalId, NewRule, Rule, RuleFilter, RuleId, RuleUpdate, SubjectId,
};

use super::blacklist::Blacklist;
use super::traits::{AuditLog, IdentityDirectory, LoanHistory, RuleStore};

/// In-process storage backend.
///
/// Used for tests and for running without a database. Rules sit behind a
/// read-write lock so evaluations keep reading while an admin edit waits.
#[derive(Debug)]
pub struct MemoryStorage {
    rules: RwLock<BTreeMap<RuleId, Rule>>,
    next_rule_id: AtomicI64,
    identities: RwLock<AHashMap<NationalId, Identity>>,
    blacklist: RwLock<Blacklist>,
    applicants: RwLock<AHashMap<SubjectId, Applicant>>,
    loans: RwLock<Vec<Loan>>,
    applications: RwLock<Vec<LoanApplication>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            rules: RwLock::new(BTreeMap::new()),
            next_rule_id: AtomicI64::new(1),
            identities: RwLock::new(AHashMap::new()),
            blacklist: RwLock::new(Blacklist::new()),
            applicants: RwLock::new(AHashMap::new()),
            loans: RwLock::new(Vec::new()),
            applications: RwLock::new(Vec::new()),
            audit: Mutex::new(Vec::new()),
        }
    }

    pub fn add_identity(&self, identity: Identity) {
        self.identities
            .write()
            .insert(identity.national_id.clone(), identity);
    }

    pub fn add_blacklisted(&self, nid: &NationalId, reason: impl Into<String>) {
        self.blacklist.write().insert(nid, reason);
    }

    pub fn add_applicant(&self, applicant: Applicant) {
        self.applicants
            .write()
            .insert(applicant.subject_id, applicant);
    }

    pub fn add_loan(&self, loan: Loan) {
        self.loans.write().push(loan);
    }

    pub fn add_application(&self, application: LoanApplication) {
        self.applications.write().push(application);
    }

    /// Snapshot of every audit entry in append order (for assertions).
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        MemoryStorage::new()
    }
}

#[async_trait]
impl RuleStore for MemoryStorage {
    async fn list_rules(&self, filter: &RuleFilter) -> anyhow::Result<Vec<Rule>> {
        Ok(self
            .rules
            .read()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn get_rule(&self, id: RuleId) -> anyhow::Result<Option<Rule>> {
        Ok(self.rules.read().get(&id).cloned())
    }

    async fn create_rule(&self, rule: &NewRule) -> anyhow::Result<Rule> {
        let id = RuleId(self.next_rule_id.fetch_add(1, Ordering::Relaxed));
        let created = Rule {
            id,
            name: rule.name.clone(),
            description: rule.description.clone(),
            condition_key: rule.condition_key.clone(),
            is_active: rule.is_active,
            created_at: Utc::now(),
        };

        self.rules.write().insert(id, created.clone());
        Ok(created)
    }

    async fn update_rule(&self, id: RuleId, update: &RuleUpdate) -> anyhow::Result<Option<Rule>> {
        let mut rules = self.rules.write();
        Ok(rules.get_mut(&id).map(|rule| {
            update.apply_to(rule);
            rule.clone()
        }))
    }

    async fn delete_rule(&self, id: RuleId) -> anyhow::Result<bool> {
        Ok(self.rules.write().remove(&id).is_some())
    }

    async fn toggle_rule(&self, id: RuleId) -> anyhow::Result<Option<Rule>> {
        let mut rules = self.rules.write();
        Ok(rules.get_mut(&id).map(|rule| {
            rule.is_active = !rule.is_active;
            rule.clone()
        }))
    }

    async fn count_rules(&self) -> anyhow::Result<usize> {
        Ok(self.rules.read().len())
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStorage {
    async fn get_identity(&self, nid: &NationalId) -> anyhow::Result<Option<Identity>> {
        Ok(self.identities.read().get(nid).cloned())
    }

    async fn is_blacklisted(&self, nid: &NationalId) -> anyhow::Result<bool> {
        Ok(self.blacklist.read().contains(nid))
    }

    async fn get_applicant(&self, subject_id: SubjectId) -> anyhow::Result<Option<Applicant>> {
        Ok(self.applicants.read().get(&subject_id).cloned())
    }

    async fn applicants_by_gender(&self, gender: &Gender) -> anyhow::Result<Vec<Applicant>> {
        let mut matches: Vec<Applicant> = self
            .applicants
            .read()
            .values()
            .filter(|a| &a.gender == gender)
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.subject_id);
        Ok(matches)
    }
}

#[async_trait]
impl LoanHistory for MemoryStorage {
    async fn has_active_loan(&self, subject_id: SubjectId) -> anyhow::Result<bool> {
        Ok(self
            .loans
            .read()
            .iter()
            .any(|l| l.subject_id == subject_id && l.is_live()))
    }

    async fn count_applications_today(&self, subject_id: SubjectId) -> anyhow::Result<u32> {
        let start_of_day = start_of_day_utc(Utc::now());

        Ok(self
            .applications
            .read()
            .iter()
            .filter(|a| a.subject_id == subject_id && a.application_date >= start_of_day)
            .count() as u32)
    }

    async fn applications_within_hours(
        &self,
        subject_id: SubjectId,
        hours: i64,
    ) -> anyhow::Result<Vec<DateTime<Utc>>> {
        let cutoff = Utc::now() - Duration::hours(hours);

        let mut dates: Vec<DateTime<Utc>> = self
            .applications
            .read()
            .iter()
            .filter(|a| a.subject_id == subject_id && a.application_date >= cutoff)
            .map(|a| a.application_date)
            .collect();
        dates.sort_by(|a, b| b.cmp(a));
        Ok(dates)
    }
}

#[async_trait]
impl AuditLog for MemoryStorage {
    async fn append(&self, record: &AuditRecord) -> anyhow::Result<AuditEntry> {
        let entry = AuditEntry::from_record(record.clone());
        self.audit.lock().push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, query: &AuditQuery) -> anyhow::Result<Vec<AuditEntry>> {
        let audit = self.audit.lock();
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(audit
            .iter()
            .rev()
            .filter(|e| query.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Midnight UTC of the day containing `now`.
pub(crate) fn start_of_day_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConditionKey, EventType, LoanStatus, NidStatus};
    use rust_decimal::Decimal;

    fn new_rule(name: &str, key: &str) -> NewRule {
        NewRule {
            name: name.to_string(),
            description: format!("{} triggered", name),
            condition_key: ConditionKey::parse(key),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_rules_iterate_in_id_order() {
        let storage = MemoryStorage::new();
        storage.create_rule(&new_rule("b", "nid_expired")).await.unwrap();
        storage.create_rule(&new_rule("a", "active_loan")).await.unwrap();

        let rules = storage.list_rules(&RuleFilter::default()).await.unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(rules[0].id < rules[1].id);
    }

    #[tokio::test]
    async fn test_toggle_flips_only_active_flag() {
        let storage = MemoryStorage::new();
        let rule = storage.create_rule(&new_rule("a", "active_loan")).await.unwrap();

        let toggled = storage.toggle_rule(rule.id).await.unwrap().unwrap();
        assert!(!toggled.is_active);
        assert_eq!(toggled.name, rule.name);
        assert_eq!(toggled.description, rule.description);

        let active = storage.list_rules(&RuleFilter::active_only()).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn test_missing_rule_is_not_found() {
        let storage = MemoryStorage::new();
        assert!(storage.get_rule(RuleId(42)).await.unwrap().is_none());
        assert!(storage.toggle_rule(RuleId(42)).await.unwrap().is_none());
        assert!(!storage.delete_rule(RuleId(42)).await.unwrap());
        assert!(storage
            .update_rule(RuleId(42), &RuleUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_identity_and_blacklist() {
        let storage = MemoryStorage::new();
        let nid = NationalId::new("123456789012");
        storage.add_identity(Identity {
            subject_id: SubjectId::new(1),
            name: "John Doe".to_string(),
            national_id: nid.clone(),
            date_of_birth: None,
            gender: None,
            nid_status: NidStatus::Active,
        });
        storage.add_blacklisted(&NationalId::new("999999999999"), "Known fraudster");

        assert!(storage.get_identity(&nid).await.unwrap().is_some());
        assert!(!storage.is_blacklisted(&nid).await.unwrap());
        assert!(storage
            .is_blacklisted(&NationalId::new("999999999999"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_loan_signals() {
        let storage = MemoryStorage::new();
        let subject = SubjectId::new(3);

        storage.add_loan(Loan {
            subject_id: subject,
            amount: Decimal::new(50000, 0),
            status: LoanStatus::Closed,
            is_active: false,
        });
        assert!(!storage.has_active_loan(subject).await.unwrap());

        storage.add_loan(Loan {
            subject_id: subject,
            amount: Decimal::new(20000, 0),
            status: LoanStatus::Approved,
            is_active: true,
        });
        assert!(storage.has_active_loan(subject).await.unwrap());

        let now = Utc::now();
        storage.add_application(LoanApplication {
            subject_id: subject,
            amount: Decimal::new(1000, 0),
            application_date: now,
        });
        storage.add_application(LoanApplication {
            subject_id: subject,
            amount: Decimal::new(1000, 0),
            application_date: now - Duration::hours(30),
        });

        let recent = storage.applications_within_hours(subject, 24).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert!(storage.count_applications_today(subject).await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_audit_list_newest_first_with_filter() {
        let storage = MemoryStorage::new();
        for subject in [1, 2, 1] {
            storage
                .append(&AuditRecord {
                    subject_id: SubjectId::new(subject),
                    event_type: EventType::Transaction,
                    amount: Decimal::new(100, 0),
                    source_address: "10.0.0.1".to_string(),
                    is_fraud: false,
                    reason: "None".to_string(),
                    risk_score: 0.0,
                })
                .await
                .unwrap();
        }

        let all = storage.list(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let for_one = storage
            .list(&AuditQuery::for_subject(SubjectId::new(1)).with_limit(1))
            .await
            .unwrap();
        assert_eq!(for_one.len(), 1);
        assert_eq!(for_one[0].id, storage.audit_entries()[2].id);
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc::now();
        let midnight = start_of_day_utc(now);
        assert!(midnight <= now);
        assert!(now - midnight < Duration::hours(24));
    }
}
