use ahash::AHashMap;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::{Gender, NationalId, NidStatus};

use super::{fuzzy, NidVerifier, VerificationError, VerificationOutcome, NAME_MATCH_THRESHOLD};

/// Record held by the national ID registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NidRecord {
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub status: NidStatus,
}

/// Lookup of national ID records.
#[async_trait]
pub trait NidRegistry: Send + Sync {
    async fn lookup(&self, nid: &NationalId) -> Result<Option<NidRecord>, VerificationError>;
}

/// In-process registry for development and tests.
#[derive(Debug, Default)]
pub struct StaticNidRegistry {
    records: AHashMap<NationalId, NidRecord>,
}

impl StaticNidRegistry {
    pub fn new() -> Self {
        StaticNidRegistry::default()
    }

    /// Registry preloaded with the development sample records.
    pub fn with_sample_records() -> Self {
        let mut registry = StaticNidRegistry::new();
        registry.insert(
            NationalId::new("123456789012"),
            sample("Alemayehu Tsegaye", "1985-03-15", "M", "2030-05-20", NidStatus::Active),
        );
        registry.insert(
            NationalId::new("234567890123"),
            sample("Hirut Bekele", "1992-07-22", "F", "2035-08-10", NidStatus::Active),
        );
        registry.insert(
            NationalId::new("345678901234"),
            sample("Dawit Hailu", "1988-11-08", "M", "2032-12-01", NidStatus::Expired),
        );
        registry
    }

    pub fn insert(&mut self, nid: NationalId, record: NidRecord) {
        self.records.insert(nid, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn sample(name: &str, dob: &str, gender: &str, expiry: &str, status: NidStatus) -> NidRecord {
    NidRecord {
        name: name.to_string(),
        date_of_birth: Some(dob.to_string()),
        gender: Some(Gender::new(gender)),
        expiry_date: Some(expiry.to_string()),
        status,
    }
}

#[async_trait]
impl NidRegistry for StaticNidRegistry {
    async fn lookup(&self, nid: &NationalId) -> Result<Option<NidRecord>, VerificationError> {
        Ok(self.records.get(nid).cloned())
    }
}

/// Registry reached over HTTP at `{base_url}/{nid}`.
pub struct HttpNidRegistry {
    http: Client,
    base_url: String,
}

impl HttpNidRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, VerificationError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fraudr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpNidRegistry {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NidRegistry for HttpNidRegistry {
    async fn lookup(&self, nid: &NationalId) -> Result<Option<NidRecord>, VerificationError> {
        let url = format!("{}/{}", self.base_url, nid.as_str());
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let record = response
                    .json::<NidRecord>()
                    .await
                    .map_err(|e| VerificationError::Malformed(e.to_string()))?;
                Ok(Some(record))
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(VerificationError::Unauthorized),
            status => Err(VerificationError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// KYC cross-check backed by any [`NidRegistry`].
pub struct RegistryNidVerifier<R> {
    registry: R,
}

impl<R: NidRegistry> RegistryNidVerifier<R> {
    pub fn new(registry: R) -> Self {
        RegistryNidVerifier { registry }
    }
}

#[async_trait]
impl<R: NidRegistry> NidVerifier for RegistryNidVerifier<R> {
    async fn verify_nid_kyc(
        &self,
        nid: &NationalId,
        legal_name: &str,
        date_of_birth: Option<&str>,
        gender: Option<&Gender>,
    ) -> Result<VerificationOutcome, VerificationError> {
        let record = self.registry.lookup(nid).await?;
        Ok(cross_check(record.as_ref(), legal_name, date_of_birth, gender))
    }
}

/// Compare provided KYC data against a registry record.
pub fn cross_check(
    record: Option<&NidRecord>,
    legal_name: &str,
    date_of_birth: Option<&str>,
    gender: Option<&Gender>,
) -> VerificationOutcome {
    let record = match record {
        Some(r) if !r.status.is_expired() => r,
        _ => return VerificationOutcome::mismatch("NID verification failed"),
    };

    let similarity = fuzzy::best_match(&record.name, legal_name);
    debug!(similarity, "NID name comparison");

    if similarity < NAME_MATCH_THRESHOLD {
        return VerificationOutcome::mismatch(format!(
            "Names don't match (only {}% similar). NID has '{}', provided '{}'",
            similarity, record.name, legal_name
        ));
    }

    if let (Some(provided), Some(registered)) = (date_of_birth, record.date_of_birth.as_deref()) {
        if provided.trim() != registered {
            return VerificationOutcome::mismatch(format!(
                "DOB mismatch: NID has '{}', provided '{}'",
                registered, provided
            ));
        }
    }

    if let (Some(provided), Some(registered)) = (gender, record.gender.as_ref()) {
        if !provided.as_str().eq_ignore_ascii_case(registered.as_str()) {
            return VerificationOutcome::mismatch(format!(
                "Gender mismatch: NID has '{}', provided '{}'",
                registered.as_str(),
                provided.as_str()
            ));
        }
    }

    VerificationOutcome::matched(format!(
        "KYC data matches NID ({}% name similarity)",
        similarity
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> RegistryNidVerifier<StaticNidRegistry> {
        RegistryNidVerifier::new(StaticNidRegistry::with_sample_records())
    }

    #[tokio::test]
    async fn test_full_match() {
        let outcome = verifier()
            .verify_nid_kyc(
                &NationalId::new("123456789012"),
                "Alemayehu Tsegaye",
                Some("1985-03-15"),
                Some(&Gender::new("m")),
            )
            .await
            .unwrap();

        assert!(outcome.matched, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_reordered_name_still_matches() {
        let outcome = verifier()
            .verify_nid_kyc(&NationalId::new("234567890123"), "Bekele Hirut", None, None)
            .await
            .unwrap();

        assert!(outcome.matched);
    }

    #[tokio::test]
    async fn test_unknown_nid_fails() {
        let outcome = verifier()
            .verify_nid_kyc(&NationalId::new("999999999999"), "Anyone", None, None)
            .await
            .unwrap();

        assert!(!outcome.matched);
        assert_eq!(outcome.message, "NID verification failed");
    }

    #[tokio::test]
    async fn test_expired_nid_fails() {
        let outcome = verifier()
            .verify_nid_kyc(&NationalId::new("345678901234"), "Dawit Hailu", None, None)
            .await
            .unwrap();

        assert!(!outcome.matched);
    }

    #[tokio::test]
    async fn test_dob_and_gender_mismatch() {
        let v = verifier();
        let nid = NationalId::new("123456789012");

        let dob = v
            .verify_nid_kyc(&nid, "Alemayehu Tsegaye", Some("1990-01-01"), None)
            .await
            .unwrap();
        assert!(dob.message.starts_with("DOB mismatch"));

        let gender = v
            .verify_nid_kyc(&nid, "Alemayehu Tsegaye", None, Some(&Gender::new("F")))
            .await
            .unwrap();
        assert!(gender.message.starts_with("Gender mismatch"));
    }

    #[test]
    fn test_name_mismatch() {
        let record = sample("Hirut Bekele", "1992-07-22", "F", "2035-08-10", NidStatus::Active);
        let outcome = cross_check(Some(&record), "John Smith", None, None);
        assert!(!outcome.matched);
        assert!(outcome.message.contains("Hirut Bekele"));
    }
}
