use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::NewRule;
use crate::storage::RuleStore;

/// Errors that can occur during rule catalogue loading.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// A rule catalogue file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleCatalogue {
    pub rules: Vec<NewRule>,
}

/// Load a rule catalogue from a YAML file.
pub fn load_catalogue(path: impl AsRef<Path>) -> Result<RuleCatalogue, SeedError> {
    let content = fs::read_to_string(path)?;
    parse_catalogue(&content)
}

/// Parse and validate catalogue YAML.
pub fn parse_catalogue(content: &str) -> Result<RuleCatalogue, SeedError> {
    let catalogue: RuleCatalogue = serde_yaml::from_str(content)?;

    validate_catalogue(&catalogue)?;

    Ok(catalogue)
}

fn validate_catalogue(catalogue: &RuleCatalogue) -> Result<(), SeedError> {
    let mut seen_names = HashSet::new();
    for rule in &catalogue.rules {
        let name = rule.name.trim();
        if name.is_empty() {
            return Err(SeedError::Validation(
                "Rule name cannot be empty".to_string(),
            ));
        }
        if rule.condition_key.as_str().trim().is_empty() {
            return Err(SeedError::Validation(format!(
                "Rule '{}' has an empty condition key",
                name
            )));
        }
        if !seen_names.insert(name.to_string()) {
            return Err(SeedError::Validation(format!(
                "Duplicate rule name: {}",
                name
            )));
        }
    }

    Ok(())
}

/// Insert the catalogue when the store holds no rules yet.
///
/// Returns the number of rules inserted.
pub async fn seed_rules(store: &dyn RuleStore, catalogue: &RuleCatalogue) -> Result<usize, SeedError> {
    let existing = store.count_rules().await?;
    if existing > 0 {
        info!(existing, "Rule store already populated, skipping seed");
        return Ok(0);
    }

    for rule in &catalogue.rules {
        if !rule.condition_key.is_recognized() {
            warn!(
                name = %rule.name,
                condition_key = %rule.condition_key.as_str(),
                "Seeding rule with unrecognized condition key"
            );
        }
        store.create_rule(rule).await?;
    }

    info!(count = catalogue.rules.len(), "Seeded rule catalogue");
    Ok(catalogue.rules.len())
}
