use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{ConditionKey, FraudContext, SubjectId};
use crate::observability::MetricsRegistry;
use crate::rules::traits::Predicate;
use crate::storage::IdentityDirectory;
use crate::verification::{
    with_timeout, NidVerifier, TinVerifier, VerificationError, VerificationOutcome,
};

/// Map a registry result to "mismatch". Errors and timeouts fail closed.
fn is_mismatch(
    result: Result<VerificationOutcome, VerificationError>,
    subject_id: SubjectId,
    check: &'static str,
    metrics: &MetricsRegistry,
) -> bool {
    match result {
        Ok(outcome) => {
            debug!(
                subject_id = %subject_id,
                check,
                matched = outcome.matched,
                message = %outcome.message,
                "Registry cross-check complete"
            );
            !outcome.matched
        }
        Err(e) => {
            metrics.record_verification_error();
            warn!(
                subject_id = %subject_id,
                check,
                error = %e,
                "Registry cross-check failed, treating as mismatch"
            );
            true
        }
    }
}

/// A directory read failed before the registry could be asked. Fails closed.
fn lookup_failed(
    error: &anyhow::Error,
    subject_id: SubjectId,
    check: &'static str,
    metrics: &MetricsRegistry,
) -> bool {
    metrics.record_verification_error();
    warn!(
        subject_id = %subject_id,
        check,
        error = %error,
        "Directory lookup failed, treating as mismatch"
    );
    true
}

/// Registered TIN name disagrees with the applicant's legal name.
///
/// Without a verifier only a supplied context flag can trigger it.
pub struct TinMismatchPredicate {
    directory: Arc<dyn IdentityDirectory>,
    verifier: Option<Arc<dyn TinVerifier>>,
    timeout: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl TinMismatchPredicate {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        verifier: Option<Arc<dyn TinVerifier>>,
        timeout: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        TinMismatchPredicate {
            directory,
            verifier,
            timeout,
            metrics,
        }
    }
}

#[async_trait]
impl Predicate for TinMismatchPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::TinMismatch
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.tin_name_mismatch {
            return Ok(flag);
        }

        let Some(verifier) = &self.verifier else {
            debug!(subject_id = %subject_id, "No TIN registry configured");
            return Ok(false);
        };

        let applicant = match self.directory.get_applicant(subject_id).await {
            Ok(Some(applicant)) => applicant,
            Ok(None) => return Ok(false),
            Err(e) => return Ok(lookup_failed(&e, subject_id, "tin", &self.metrics)),
        };
        let Some(tin) = applicant
            .tin_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return Ok(false);
        };

        let legal_name = applicant.full_name();
        let result = with_timeout(self.timeout, verifier.verify_tin(tin, &legal_name)).await;

        Ok(is_mismatch(result, subject_id, "tin", &self.metrics))
    }
}

/// National id registry disagrees with the KYC data on file.
pub struct NidKycMismatchPredicate {
    directory: Arc<dyn IdentityDirectory>,
    verifier: Option<Arc<dyn NidVerifier>>,
    timeout: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl NidKycMismatchPredicate {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        verifier: Option<Arc<dyn NidVerifier>>,
        timeout: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        NidKycMismatchPredicate {
            directory,
            verifier,
            timeout,
            metrics,
        }
    }
}

#[async_trait]
impl Predicate for NidKycMismatchPredicate {
    fn key(&self) -> ConditionKey {
        ConditionKey::NidKycMismatch
    }

    async fn evaluate(&self, subject_id: SubjectId, ctx: &FraudContext) -> anyhow::Result<bool> {
        if let Some(flag) = ctx.nid_kyc_mismatch {
            return Ok(flag);
        }

        let Some(verifier) = &self.verifier else {
            debug!(subject_id = %subject_id, "No NID registry configured");
            return Ok(false);
        };

        let applicant = match self.directory.get_applicant(subject_id).await {
            Ok(Some(applicant)) => applicant,
            Ok(None) => return Ok(false),
            Err(e) => return Ok(lookup_failed(&e, subject_id, "nid_kyc", &self.metrics)),
        };
        let Some(nid) = applicant.national_id.clone().filter(|n| !n.is_empty()) else {
            return Ok(false);
        };

        let identity = match self.directory.get_identity(&nid).await {
            Ok(identity) => identity,
            Err(e) => return Ok(lookup_failed(&e, subject_id, "nid_kyc", &self.metrics)),
        };
        let legal_name = applicant.full_name();
        let date_of_birth = identity.as_ref().and_then(|i| i.date_of_birth.as_deref());
        let gender = identity
            .as_ref()
            .and_then(|i| i.gender.as_ref())
            .unwrap_or(&applicant.gender);

        let result = with_timeout(
            self.timeout,
            verifier
                .verify_nid_kyc(&nid, &legal_name, date_of_birth, Some(gender)),
        )
        .await;

        Ok(is_mismatch(result, subject_id, "nid_kyc", &self.metrics))
    }
}
