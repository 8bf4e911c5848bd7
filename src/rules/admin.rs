use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{ConditionKey, NewRule, Rule, RuleFilter, RuleId, RuleUpdate};
use crate::storage::{AuditLog, RuleStore};

/// Errors from rule administration.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Rule {0} not found")]
    NotFound(RuleId),

    #[error("Invalid rule: {0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Overview for the rule administration dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_rules: usize,
    pub active_rules: usize,
    pub inactive_rules: usize,
    pub total_assessments: u64,
    pub fraud_events: u64,
    pub fraud_rate: f64,
    pub condition_keys: Vec<String>,
}

/// Validated CRUD over the rule store.
pub struct RuleAdmin {
    rules: Arc<dyn RuleStore>,
    audit: Arc<dyn AuditLog>,
}

impl RuleAdmin {
    pub fn new(rules: Arc<dyn RuleStore>, audit: Arc<dyn AuditLog>) -> Self {
        RuleAdmin { rules, audit }
    }

    pub async fn list(&self, filter: &RuleFilter) -> Result<Vec<Rule>, AdminError> {
        Ok(self.rules.list_rules(filter).await?)
    }

    pub async fn get(&self, id: RuleId) -> Result<Rule, AdminError> {
        self.rules
            .get_rule(id)
            .await?
            .ok_or(AdminError::NotFound(id))
    }

    pub async fn create(&self, rule: NewRule) -> Result<Rule, AdminError> {
        let rule = NewRule {
            name: required("name", &rule.name)?,
            description: rule.description.trim().to_string(),
            condition_key: checked_key(&rule.condition_key)?,
            is_active: rule.is_active,
        };

        let created = self.rules.create_rule(&rule).await?;
        info!(
            rule_id = %created.id,
            condition_key = %created.condition_key,
            "Rule created"
        );
        Ok(created)
    }

    /// Apply the present fields. An empty update returns the rule unchanged.
    pub async fn update(&self, id: RuleId, update: RuleUpdate) -> Result<Rule, AdminError> {
        if update.is_empty() {
            return self.get(id).await;
        }

        let update = RuleUpdate {
            name: update.name.as_deref().map(|n| required("name", n)).transpose()?,
            description: update.description.map(|d| d.trim().to_string()),
            condition_key: update.condition_key.as_ref().map(checked_key).transpose()?,
            is_active: update.is_active,
        };

        let updated = self
            .rules
            .update_rule(id, &update)
            .await?
            .ok_or(AdminError::NotFound(id))?;
        info!(rule_id = %id, "Rule updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: RuleId) -> Result<(), AdminError> {
        if !self.rules.delete_rule(id).await? {
            return Err(AdminError::NotFound(id));
        }
        info!(rule_id = %id, "Rule deleted");
        Ok(())
    }

    /// Flip the active flag.
    pub async fn toggle(&self, id: RuleId) -> Result<Rule, AdminError> {
        let rule = self
            .rules
            .toggle_rule(id)
            .await?
            .ok_or(AdminError::NotFound(id))?;
        info!(rule_id = %id, is_active = rule.is_active, "Rule toggled");
        Ok(rule)
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, AdminError> {
        let rules = self.rules.list_rules(&RuleFilter::default()).await?;
        let active_rules = rules.iter().filter(|r| r.is_active).count();
        let audit = self.audit.summary().await?;

        Ok(DashboardSummary {
            total_rules: rules.len(),
            active_rules,
            inactive_rules: rules.len() - active_rules,
            total_assessments: audit.total,
            fraud_events: audit.fraud,
            fraud_rate: audit.fraud_rate(),
            condition_keys: ConditionKey::KNOWN
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, AdminError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AdminError::Invalid(format!("{} cannot be empty", field)));
    }
    Ok(value.to_string())
}

fn checked_key(key: &ConditionKey) -> Result<ConditionKey, AdminError> {
    let raw = required("condition_key", key.as_str())?;
    let key = ConditionKey::parse(&raw);
    if !key.is_recognized() {
        warn!(condition_key = %raw, "Rule uses an unrecognized condition key and will never trigger");
    }
    Ok(key)
}
