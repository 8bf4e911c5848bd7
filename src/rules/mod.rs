pub mod admin;
pub mod predicates;
pub mod registry;
pub mod seed;
pub mod traits;

pub use admin::{AdminError, DashboardSummary, RuleAdmin};
pub use registry::{PredicateDeps, PredicateRegistry};
pub use seed::{load_catalogue, seed_rules, RuleCatalogue, SeedError};
pub use traits::{FraudPatternMatcher, Predicate};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{EngineOutcome, FraudContext, RuleFilter, SubjectId, TriggeredRule};
use crate::observability::MetricsRegistry;
use crate::storage::RuleStore;

/// Evaluates active rules against one subject.
///
/// Rules are read from the store on every call, so admin edits apply to
/// the next evaluation.
pub struct RuleEngine {
    rules: Arc<dyn RuleStore>,
    registry: PredicateRegistry,
    metrics: Arc<MetricsRegistry>,
}

impl RuleEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        registry: PredicateRegistry,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        RuleEngine {
            rules,
            registry,
            metrics,
        }
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    /// Run every active rule in store order.
    ///
    /// Only a failure to read the rule store is returned as an error.
    /// Predicate failures are logged and the rule counts as not triggered.
    pub async fn evaluate(
        &self,
        subject_id: SubjectId,
        ctx: &FraudContext,
    ) -> anyhow::Result<EngineOutcome> {
        let rules = self.rules.list_rules(&RuleFilter::active_only()).await?;
        let mut outcome = EngineOutcome::default();

        for rule in rules.into_iter().filter(|r| r.is_active) {
            let Some(predicate) = self.registry.get(&rule.condition_key) else {
                debug!(
                    rule_id = %rule.id,
                    condition_key = %rule.condition_key,
                    "No predicate for condition key, skipping rule"
                );
                self.metrics.record_rule_skipped();
                outcome.skipped.push(rule.id);
                continue;
            };

            outcome.evaluated += 1;

            match predicate.evaluate(subject_id, ctx).await {
                Ok(triggered) => {
                    self.metrics.record_rule_evaluation(triggered);
                    if triggered {
                        debug!(
                            subject_id = %subject_id,
                            rule_id = %rule.id,
                            condition_key = %rule.condition_key,
                            "Rule triggered"
                        );
                        outcome.triggered.push(TriggeredRule {
                            rule_id: rule.id,
                            condition_key: rule.condition_key,
                            description: rule.description,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        subject_id = %subject_id,
                        rule_id = %rule.id,
                        condition_key = %rule.condition_key,
                        error = %e,
                        "Predicate failed, treating rule as not triggered"
                    );
                    self.metrics.record_rule_evaluation(false);
                    self.metrics.record_rule_failure();
                    outcome.failed.push(rule.id);
                }
            }
        }

        Ok(outcome)
    }
}
