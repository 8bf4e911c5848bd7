use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{fuzzy, TinVerifier, VerificationError, VerificationOutcome, NAME_MATCH_THRESHOLD};

#[derive(Debug, Serialize)]
struct TinLookup<'a> {
    username: &'a str,
    password: &'a str,
    tin_number: &'a str,
}

/// Body returned by the TIN registry.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TinRegistryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<TinRecord>,
    #[serde(default)]
    message: Option<String>,
}

/// Registered entity; the name field varies by registry version.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TinRecord {
    #[serde(default)]
    business_name: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    entity_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TinRecord {
    fn registered_name(&self) -> Option<&str> {
        [
            &self.business_name,
            &self.company_name,
            &self.entity_name,
            &self.name,
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
    }
}

/// TIN registry client over HTTP.
pub struct HttpTinVerifier {
    http: Client,
    url: String,
    username: String,
    password: String,
}

impl HttpTinVerifier {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, VerificationError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fraudr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpTinVerifier {
            http,
            url: url.into(),
            username: username.into(),
            password: password.into(),
        })
    }
}

#[async_trait]
impl TinVerifier for HttpTinVerifier {
    async fn verify_tin(
        &self,
        tin: &str,
        legal_name: &str,
    ) -> Result<VerificationOutcome, VerificationError> {
        let response = self
            .http
            .post(&self.url)
            .json(&TinLookup {
                username: &self.username,
                password: &self.password,
                tin_number: tin,
            })
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body: TinRegistryResponse = response.json().await?;
                Ok(outcome_from_response(body, legal_name))
            }
            StatusCode::UNAUTHORIZED => Err(VerificationError::Unauthorized),
            StatusCode::NOT_FOUND => Ok(VerificationOutcome::mismatch(
                "TIN not found in registry",
            )),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(VerificationError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                })
            }
        }
    }
}

pub(crate) fn outcome_from_response(
    body: TinRegistryResponse,
    legal_name: &str,
) -> VerificationOutcome {
    let record = match body.data {
        Some(record) if body.success => record,
        _ => {
            return VerificationOutcome::mismatch(
                body.message
                    .unwrap_or_else(|| "TIN not found in registry".to_string()),
            )
        }
    };

    let Some(registered) = record.registered_name() else {
        return VerificationOutcome::mismatch("No registered name for this TIN");
    };

    compare_names(registered, legal_name)
}

/// Compare the registered name with the provided legal name.
pub fn compare_names(registered: &str, provided: &str) -> VerificationOutcome {
    let similarity = fuzzy::ratio(registered, provided);
    debug!(similarity, "TIN name comparison");

    if similarity >= NAME_MATCH_THRESHOLD {
        VerificationOutcome::matched(format!(
            "TIN name matches with {}% similarity",
            similarity
        ))
    } else {
        VerificationOutcome::mismatch(format!(
            "TIN name mismatch: registry has '{}', provided '{}' ({}% similar)",
            registered, provided, similarity
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> TinRegistryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_matching_business_name() {
        let body = response(r#"{"success":true,"data":{"business_name":"John Doe"}}"#);
        let outcome = outcome_from_response(body, "John Doe");
        assert!(outcome.matched);
    }

    #[test]
    fn test_name_field_fallback() {
        let body = response(r#"{"success":true,"data":{"business_name":" ","name":"Jane Smith"}}"#);
        let outcome = outcome_from_response(body, "Jane Smith");
        assert!(outcome.matched);
    }

    #[test]
    fn test_different_name_is_mismatch() {
        let body = response(r#"{"success":true,"data":{"company_name":"Acme Trading PLC"}}"#);
        let outcome = outcome_from_response(body, "John Doe");
        assert!(!outcome.matched);
        assert!(outcome.message.contains("Acme Trading PLC"));
    }

    #[test]
    fn test_unsuccessful_lookup_is_mismatch() {
        let body = response(r#"{"success":false,"message":"TIN not registered"}"#);
        let outcome = outcome_from_response(body, "John Doe");
        assert!(!outcome.matched);
        assert_eq!(outcome.message, "TIN not registered");
    }

    #[test]
    fn test_missing_name_is_mismatch() {
        let body = response(r#"{"success":true,"data":{}}"#);
        assert!(!outcome_from_response(body, "John Doe").matched);
    }
}
