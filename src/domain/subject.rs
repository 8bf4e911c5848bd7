use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the account holder being assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl SubjectId {
    pub fn new(id: i64) -> Self {
        SubjectId(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// National identity number, whitespace-trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NationalId(String);

impl NationalId {
    pub fn new(nid: impl Into<String>) -> Self {
        NationalId(nid.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gender marker as recorded at onboarding ("M", "F", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gender(String);

impl Gender {
    /// Create a gender marker, normalizing to uppercase.
    pub fn new(g: impl Into<String>) -> Self {
        Gender(g.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The account holder behind a subject id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub subject_id: SubjectId,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub phone_number: String,
    #[serde(default)]
    pub tin_number: Option<String>,
    #[serde(default)]
    pub national_id: Option<NationalId>,
}

impl Applicant {
    /// Legal name as used for registry cross-checks.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Phone number with separators removed, for comparison.
    pub fn normalized_phone(&self) -> String {
        self.phone_number
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applicant() -> Applicant {
        Applicant {
            subject_id: SubjectId::new(1),
            first_name: " John".to_string(),
            last_name: "Doe ".to_string(),
            gender: Gender::new("m"),
            phone_number: "+251 911-234-567".to_string(),
            tin_number: None,
            national_id: Some(NationalId::new(" 123456789012 ")),
        }
    }

    #[test]
    fn test_full_name_trims_parts() {
        assert_eq!(applicant().full_name(), "John Doe");
    }

    #[test]
    fn test_normalized_phone() {
        assert_eq!(applicant().normalized_phone(), "+251911234567");
    }

    #[test]
    fn test_identifier_normalization() {
        let a = applicant();
        assert_eq!(a.gender.as_str(), "M");
        assert_eq!(a.national_id.unwrap().as_str(), "123456789012");
    }
}
