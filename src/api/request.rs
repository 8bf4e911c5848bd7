use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AuditQuery, ConditionKey, EventType, FraudContext, NationalId, RuleFilter, SubjectId};
use crate::orchestrator::AssessmentRequest;

use super::response::ApiError;

/// Request to assess a transaction or loan application.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssessRequest {
    pub subject_id: i64,

    /// Amount as a decimal string or number
    pub amount: Decimal,

    #[serde(default)]
    pub source_address: String,

    pub national_id: String,

    /// `transaction` (default) or `loan_application`
    #[serde(default)]
    pub event_type: Option<String>,

    /// Precomputed fraud signals (optional)
    #[serde(default)]
    pub context: Option<FraudContext>,
}

impl AssessRequest {
    /// Convert to an orchestrator request.
    pub fn to_assessment(&self) -> Result<AssessmentRequest, ApiError> {
        let event_type = match self.event_type.as_deref() {
            None => EventType::Transaction,
            Some(raw) => EventType::parse(raw.trim())
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown event type: {}", raw)))?,
        };

        let mut req = AssessmentRequest::new(
            SubjectId::new(self.subject_id),
            self.amount,
            self.source_address.clone(),
            NationalId::new(self.national_id.as_str()),
        )
        .with_event_type(event_type);
        req.context = self.context.clone();

        Ok(req)
    }
}

/// Query parameters for listing rules.
#[derive(Debug, Default, Deserialize)]
pub struct RuleListParams {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub condition_key: Option<String>,
}

impl RuleListParams {
    pub fn to_filter(&self) -> RuleFilter {
        RuleFilter {
            active: self.active,
            condition_key: self.condition_key.as_deref().map(ConditionKey::parse),
        }
    }
}

/// Query parameters for listing audit entries.
#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AuditParams {
    pub fn to_query(&self) -> AuditQuery {
        AuditQuery {
            subject_id: self.subject_id.map(SubjectId::new),
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assess_request() {
        let req: AssessRequest = serde_json::from_str(
            r#"{
                "subject_id": 7,
                "amount": "1250.75",
                "source_address": "10.1.2.3",
                "national_id": " 123456789012 ",
                "event_type": "loan_application",
                "context": {"has_active_loan": true}
            }"#,
        )
        .unwrap();

        let assessment = req.to_assessment().unwrap();
        assert_eq!(assessment.subject_id, SubjectId::new(7));
        assert_eq!(assessment.amount, Decimal::new(125075, 2));
        assert_eq!(assessment.national_id.as_str(), "123456789012");
        assert_eq!(assessment.event_type, EventType::LoanApplication);
        assert_eq!(
            assessment.context.and_then(|c| c.has_active_loan),
            Some(true)
        );
    }

    #[test]
    fn test_unknown_event_type() {
        let req = AssessRequest {
            subject_id: 1,
            amount: Decimal::ONE,
            source_address: String::new(),
            national_id: "1".to_string(),
            event_type: Some("refund".to_string()),
            context: None,
        };

        assert!(matches!(req.to_assessment(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_rule_filter_params() {
        let params = RuleListParams {
            active: Some(true),
            condition_key: Some("nid_expired".to_string()),
        };

        let filter = params.to_filter();
        assert_eq!(filter.active, Some(true));
        assert_eq!(filter.condition_key, Some(ConditionKey::NidExpired));
    }
}
