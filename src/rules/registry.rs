use ahash::AHashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ConditionKey;
use crate::observability::MetricsRegistry;
use crate::storage::{IdentityDirectory, LoanHistory};
use crate::verification::{NidVerifier, TinVerifier};

use super::predicates::{
    ActiveLoanPredicate, DuplicatePhonePredicate, ExcessiveReapplyPredicate,
    FraudDbMatchPredicate, NidExpiredPredicate, NidKycMismatchPredicate, NidSuspendedPredicate,
    RapidReapplyPredicate, TinMismatchPredicate,
};
use super::traits::{FraudPatternMatcher, Predicate};

/// Collaborators the built-in predicates are constructed with.
pub struct PredicateDeps {
    pub identity: Arc<dyn IdentityDirectory>,
    pub loans: Arc<dyn LoanHistory>,
    pub tin: Option<Arc<dyn TinVerifier>>,
    pub nid: Option<Arc<dyn NidVerifier>>,
    pub pattern_matcher: Option<Arc<dyn FraudPatternMatcher>>,
    pub verification_timeout: Duration,
    pub metrics: Arc<MetricsRegistry>,
}

/// Condition key to predicate dispatch table.
#[derive(Default)]
pub struct PredicateRegistry {
    predicates: AHashMap<ConditionKey, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        PredicateRegistry::default()
    }

    /// Register all nine built-in predicates.
    ///
    /// `tin_mismatch` and `nid_kyc_mismatch` without a verifier only honour
    /// a supplied context flag.
    pub fn builtin(deps: PredicateDeps) -> Self {
        let mut registry = PredicateRegistry::new();
        let identity = deps.identity;
        let loans = deps.loans;

        registry.register(Arc::new(ActiveLoanPredicate::new(loans.clone())));
        registry.register(Arc::new(DuplicatePhonePredicate::new(identity.clone())));
        registry.register(Arc::new(RapidReapplyPredicate::new(loans.clone())));
        registry.register(Arc::new(ExcessiveReapplyPredicate::new(loans)));

        let fraud_db = FraudDbMatchPredicate::new(identity.clone());
        let fraud_db = match deps.pattern_matcher {
            Some(matcher) => fraud_db.with_matcher(matcher),
            None => fraud_db,
        };
        registry.register(Arc::new(fraud_db));

        registry.register(Arc::new(NidExpiredPredicate::new(identity.clone())));
        registry.register(Arc::new(NidSuspendedPredicate::new(identity.clone())));

        registry.register(Arc::new(TinMismatchPredicate::new(
            identity.clone(),
            deps.tin,
            deps.verification_timeout,
            deps.metrics.clone(),
        )));
        registry.register(Arc::new(NidKycMismatchPredicate::new(
            identity,
            deps.nid,
            deps.verification_timeout,
            deps.metrics,
        )));

        registry
    }

    /// Register a predicate under its own key, replacing any previous one.
    pub fn register(&mut self, predicate: Arc<dyn Predicate>) {
        self.predicates.insert(predicate.key(), predicate);
    }

    /// Predicate for `key`, if one is registered.
    ///
    /// `Unrecognized` keys never resolve.
    pub fn get(&self, key: &ConditionKey) -> Option<&Arc<dyn Predicate>> {
        if !key.is_recognized() {
            return None;
        }
        self.predicates.get(key)
    }

    pub fn contains(&self, key: &ConditionKey) -> bool {
        self.get(key).is_some()
    }

    /// Known keys with no registered predicate.
    pub fn missing_keys(&self) -> Vec<ConditionKey> {
        ConditionKey::KNOWN
            .iter()
            .filter(|k| !self.predicates.contains_key(*k))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
