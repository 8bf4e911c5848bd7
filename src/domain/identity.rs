use serde::{Deserialize, Serialize};
use std::fmt;

use super::subject::{Gender, NationalId, SubjectId};

/// Lifecycle status of a national identity document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NidStatus {
    #[default]
    Active,
    Expired,
    Suspended,
    /// Any other registry status, kept verbatim
    Other(String),
}

impl NidStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "active" => NidStatus::Active,
            "expired" => NidStatus::Expired,
            "suspended" => NidStatus::Suspended,
            other => NidStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NidStatus::Active => "active",
            NidStatus::Expired => "expired",
            NidStatus::Suspended => "suspended",
            NidStatus::Other(s) => s.as_str(),
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        *self == NidStatus::Expired
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        *self == NidStatus::Suspended
    }
}

impl From<String> for NidStatus {
    fn from(s: String) -> Self {
        NidStatus::parse(&s)
    }
}

impl From<NidStatus> for String {
    fn from(status: NidStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for NidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verified identity record held on file for a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub name: String,
    pub national_id: NationalId,
    /// ISO date (YYYY-MM-DD) as issued on the document
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub nid_status: NidStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(NidStatus::parse("EXPIRED"), NidStatus::Expired);
        assert_eq!(NidStatus::parse(" suspended "), NidStatus::Suspended);
        assert_eq!(NidStatus::parse("active"), NidStatus::Active);
        assert_eq!(
            NidStatus::parse("revoked"),
            NidStatus::Other("revoked".to_string())
        );
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&NidStatus::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");

        let parsed: NidStatus = serde_json::from_str("\"expired\"").unwrap();
        assert!(parsed.is_expired());
        assert!(!parsed.is_suspended());
    }
}
