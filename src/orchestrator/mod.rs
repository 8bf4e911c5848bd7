pub mod context;
pub mod scoring;

pub use context::ContextBuilder;
pub use scoring::ScoringPolicy;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::verdict::{
    AUDIT_CLEAN_REASON, IDENTITY_NOT_VERIFIED, NATIONAL_ID_BLACKLISTED, RULES_UNAVAILABLE,
};
use crate::domain::{AuditRecord, EventType, FraudContext, NationalId, SubjectId, Verdict};
use crate::observability::{MetricsRegistry, TimingGuard};
use crate::rules::{FraudPatternMatcher, PredicateDeps, PredicateRegistry, RuleEngine};
use crate::storage::{AuditLog, IdentityDirectory, Storage};
use crate::verification::{NidVerifier, TinVerifier};

/// One transaction or loan application to assess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub subject_id: SubjectId,
    pub amount: Decimal,
    pub source_address: String,
    pub national_id: NationalId,
    #[serde(default)]
    pub event_type: EventType,
    /// Precomputed signals; present fields override live computation
    #[serde(default)]
    pub context: Option<FraudContext>,
}

impl AssessmentRequest {
    pub fn new(
        subject_id: SubjectId,
        amount: Decimal,
        source_address: impl Into<String>,
        national_id: NationalId,
    ) -> Self {
        AssessmentRequest {
            subject_id,
            amount,
            source_address: source_address.into(),
            national_id,
            event_type: EventType::Transaction,
            context: None,
        }
    }

    pub fn with_context(mut self, context: FraudContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }
}

/// External registry clients. Without one, its predicate trusts supplied context only.
#[derive(Clone)]
pub struct Verifiers {
    pub tin: Option<Arc<dyn TinVerifier>>,
    pub nid: Option<Arc<dyn NidVerifier>>,
    pub pattern_matcher: Option<Arc<dyn FraudPatternMatcher>>,
    pub timeout: Duration,
}

impl Default for Verifiers {
    fn default() -> Self {
        Verifiers {
            tin: None,
            nid: None,
            pattern_matcher: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Sequences gates, context assembly, rule evaluation, scoring and audit.
pub struct FraudOrchestrator {
    identity: Arc<dyn IdentityDirectory>,
    context: ContextBuilder,
    engine: RuleEngine,
    audit: Arc<dyn AuditLog>,
    scoring: ScoringPolicy,
    metrics: Arc<MetricsRegistry>,
}

impl FraudOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityDirectory>,
        context: ContextBuilder,
        engine: RuleEngine,
        audit: Arc<dyn AuditLog>,
        scoring: ScoringPolicy,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        FraudOrchestrator {
            identity,
            context,
            engine,
            audit,
            scoring,
            metrics,
        }
    }

    /// Wire every collaborator from one storage backend.
    ///
    /// `audit` is passed separately so a journal can replace the store's log.
    pub fn from_storage<S: Storage + 'static>(
        storage: Arc<S>,
        audit: Arc<dyn AuditLog>,
        verifiers: Verifiers,
        scoring: ScoringPolicy,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let registry = PredicateRegistry::builtin(PredicateDeps {
            identity: storage.clone(),
            loans: storage.clone(),
            tin: verifiers.tin,
            nid: verifiers.nid,
            pattern_matcher: verifiers.pattern_matcher,
            verification_timeout: verifiers.timeout,
            metrics: metrics.clone(),
        });

        let engine = RuleEngine::new(storage.clone(), registry, metrics.clone());
        let context = ContextBuilder::new(storage.clone());

        FraudOrchestrator::new(storage, context, engine, audit, scoring, metrics)
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn scoring(&self) -> ScoringPolicy {
        self.scoring
    }

    /// Assess one request. Always returns a verdict.
    pub async fn assess(&self, req: &AssessmentRequest) -> Verdict {
        let _timer = TimingGuard::new(&self.metrics);
        let verdict = self.run(req).await;
        self.metrics.record_verdict(&verdict);

        info!(
            subject_id = %req.subject_id,
            event_type = %req.event_type,
            amount = %req.amount,
            is_fraud = verdict.is_fraud,
            risk_score = verdict.risk_score,
            reason = %verdict.reason,
            "Assessment complete"
        );

        verdict
    }

    async fn run(&self, req: &AssessmentRequest) -> Verdict {
        let subject_id = req.subject_id;

        let identity = match self.identity.get_identity(&req.national_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                self.metrics.record_identity_gate();
                return Verdict::rejected(IDENTITY_NOT_VERIFIED);
            }
            Err(e) => {
                warn!(subject_id = %subject_id, error = %e, "Identity lookup failed");
                self.metrics.record_identity_gate();
                return Verdict::rejected(IDENTITY_NOT_VERIFIED);
            }
        };

        match self.identity.is_blacklisted(&req.national_id).await {
            Ok(true) => {
                self.metrics.record_blacklist_gate();
                return Verdict::rejected(NATIONAL_ID_BLACKLISTED);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    subject_id = %subject_id,
                    error = %e,
                    "Blacklist lookup failed, continuing as not blacklisted"
                );
            }
        }

        let ctx = self
            .context
            .build(subject_id, &identity, req.context.as_ref())
            .await;

        let verdict = match self.engine.evaluate(subject_id, &ctx).await {
            Ok(outcome) => {
                let is_fraud = outcome.is_fraud();
                let score = self.scoring.score(is_fraud, req.amount);
                Verdict::from_rules(is_fraud, outcome.reason(), score)
            }
            Err(e) => {
                error!(subject_id = %subject_id, error = %e, "Rule store unavailable");
                Verdict::rejected(RULES_UNAVAILABLE)
            }
        };

        self.record_audit(req, &verdict).await;
        verdict
    }

    async fn record_audit(&self, req: &AssessmentRequest, verdict: &Verdict) {
        let reason = if verdict.is_fraud {
            verdict.reason.clone()
        } else {
            AUDIT_CLEAN_REASON.to_string()
        };

        let record = AuditRecord {
            subject_id: req.subject_id,
            event_type: req.event_type,
            amount: req.amount,
            source_address: req.source_address.clone(),
            is_fraud: verdict.is_fraud,
            reason,
            risk_score: verdict.risk_score,
        };

        match self.audit.append(&record).await {
            Ok(_) => self.metrics.record_audit_write(true),
            Err(e) => {
                self.metrics.record_audit_write(false);
                error!(subject_id = %req.subject_id, error = %e, "Audit write failed");
            }
        }
    }
}
