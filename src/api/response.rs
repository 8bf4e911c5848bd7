use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{SubjectId, Verdict};
use crate::rules::AdminError;

/// Response from an assessment.
#[derive(Debug, Serialize)]
pub struct VerdictResponse {
    pub subject_id: SubjectId,
    pub is_fraud: bool,
    pub reason: String,
    pub risk_score: f64,
}

impl VerdictResponse {
    pub fn new(subject_id: SubjectId, verdict: Verdict) -> Self {
        VerdictResponse {
            subject_id,
            is_fraud: verdict.is_fraud,
            reason: verdict.reason,
            risk_score: verdict.risk_score,
        }
    }

    /// `403 Forbidden` for fraud, `200 OK` otherwise.
    pub fn status(&self) -> StatusCode {
        if self.is_fraud {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::OK
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub registered_predicates: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::NotFound(_) => ApiError::NotFound(e.to_string()),
            AdminError::Invalid(_) => ApiError::BadRequest(e.to_string()),
            AdminError::Storage(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ErrorResponse::new(self.to_string(), code))).into_response()
    }
}
