pub mod audit;
pub mod context;
pub mod identity;
pub mod loan;
pub mod rule;
pub mod subject;
pub mod verdict;

pub use audit::{AuditEntry, AuditQuery, AuditRecord, AuditSummary, EventType};
pub use context::FraudContext;
pub use identity::{Identity, NidStatus};
pub use loan::{Loan, LoanApplication, LoanStatus};
pub use rule::{ConditionKey, NewRule, Rule, RuleFilter, RuleId, RuleUpdate};
pub use subject::{Applicant, Gender, NationalId, SubjectId};
pub use verdict::{EngineOutcome, TriggeredRule, Verdict};
