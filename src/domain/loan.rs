use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::subject::SubjectId;

/// Loan lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[default]
    Pending,
    Approved,
    Active,
    Closed,
    Rejected,
}

impl LoanStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(LoanStatus::Pending),
            "approved" => Some(LoanStatus::Approved),
            "active" => Some(LoanStatus::Active),
            "closed" => Some(LoanStatus::Closed),
            "rejected" => Some(LoanStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Closed => "closed",
            LoanStatus::Rejected => "rejected",
        }
    }

    /// Statuses that count as an outstanding loan.
    #[inline]
    pub fn is_outstanding(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Active)
    }
}

/// A loan held by a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub subject_id: SubjectId,
    pub amount: Decimal,
    pub status: LoanStatus,
    pub is_active: bool,
}

impl Loan {
    /// Outstanding status with the active flag set.
    pub fn is_live(&self) -> bool {
        self.status.is_outstanding() && self.is_active
    }
}

/// A loan application submitted by a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub subject_id: SubjectId,
    pub amount: Decimal,
    pub application_date: DateTime<Utc>,
}
