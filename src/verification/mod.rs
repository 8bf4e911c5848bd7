pub mod fuzzy;
pub mod nid;
pub mod tin;

pub use nid::{HttpNidRegistry, NidRecord, NidRegistry, RegistryNidVerifier, StaticNidRegistry};
pub use tin::HttpTinVerifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{Gender, NationalId};

/// Minimum similarity for a registry name to count as the same person.
pub const NAME_MATCH_THRESHOLD: u8 = 85;

/// Errors from an external registry call.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),

    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry rejected credentials")]
    Unauthorized,

    #[error("registry returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("registry response malformed: {0}")]
    Malformed(String),
}

/// Result of a cross-check against an external registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub matched: bool,
    pub message: String,
}

impl VerificationOutcome {
    pub fn matched(message: impl Into<String>) -> Self {
        VerificationOutcome {
            matched: true,
            message: message.into(),
        }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        VerificationOutcome {
            matched: false,
            message: message.into(),
        }
    }
}

/// Cross-checks a tax identifier against the TIN registry.
#[async_trait]
pub trait TinVerifier: Send + Sync {
    async fn verify_tin(
        &self,
        tin: &str,
        legal_name: &str,
    ) -> Result<VerificationOutcome, VerificationError>;
}

/// Cross-checks identity data against the national ID registry.
#[async_trait]
pub trait NidVerifier: Send + Sync {
    async fn verify_nid_kyc(
        &self,
        nid: &NationalId,
        legal_name: &str,
        date_of_birth: Option<&str>,
        gender: Option<&Gender>,
    ) -> Result<VerificationOutcome, VerificationError>;
}

/// Bound a registry call by `limit`.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, VerificationError>
where
    F: Future<Output = Result<T, VerificationError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(VerificationError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_maps_to_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, VerificationError>(VerificationOutcome::matched("late"))
        };

        let result = with_timeout(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(VerificationError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let fast = async { Ok::<_, VerificationError>(VerificationOutcome::mismatch("no")) };

        let result = with_timeout(Duration::from_secs(1), fast).await.unwrap();
        assert!(!result.matched);
    }
}
