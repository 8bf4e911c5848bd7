pub mod api;
pub mod config;
pub mod domain;
pub mod observability;
pub mod orchestrator;
pub mod rules;
pub mod storage;
pub mod verification;

pub use config::Config;
pub use domain::{FraudContext, Rule, Verdict};
pub use orchestrator::{AssessmentRequest, FraudOrchestrator, ScoringPolicy};
pub use rules::{RuleAdmin, RuleEngine};
