use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::subject::SubjectId;

/// Kind of event that was assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    Transaction,
    LoanApplication,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Transaction => "transaction",
            EventType::LoanApplication => "loan_application",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transaction" => Some(EventType::Transaction),
            "loan_application" => Some(EventType::LoanApplication),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one assessment, ready to be appended to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub subject_id: SubjectId,
    pub event_type: EventType,
    pub amount: Decimal,
    pub source_address: String,
    pub is_fraud: bool,
    pub reason: String,
    pub risk_score: f64,
}

/// A persisted audit record. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub subject_id: SubjectId,
    pub event_type: EventType,
    pub amount: Decimal,
    pub source_address: String,
    pub is_fraud: bool,
    pub reason: String,
    pub risk_score: f64,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Stamp a record with a fresh id and the current time.
    pub fn from_record(record: AuditRecord) -> Self {
        AuditEntry {
            id: Uuid::new_v4(),
            subject_id: record.subject_id,
            event_type: record.event_type,
            amount: record.amount,
            source_address: record.source_address,
            is_fraud: record.is_fraud,
            reason: record.reason,
            risk_score: record.risk_score,
            created_at: Utc::now(),
        }
    }
}

/// Query over the audit log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn for_subject(subject_id: SubjectId) -> Self {
        AuditQuery {
            subject_id: Some(subject_id),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.subject_id.map_or(true, |s| entry.subject_id == s)
    }
}

/// Aggregate counts over the audit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: u64,
    pub fraud: u64,
}

impl AuditSummary {
    pub fn fraud_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.fraud as f64 / self.total as f64
    }
}
