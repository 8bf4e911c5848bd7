use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::domain::{AuditQuery, NewRule, RuleId, RuleUpdate, SubjectId};
use crate::observability::MetricsRegistry;
use crate::orchestrator::FraudOrchestrator;
use crate::rules::RuleAdmin;
use crate::storage::AuditLog;

use super::request::{AssessRequest, AuditParams, RuleListParams};
use super::response::{ApiError, HealthResponse, VerdictResponse};

/// Entries returned by the per-subject history endpoint.
pub const HISTORY_LIMIT: usize = 50;

/// Shared application state.
pub struct AppState {
    pub orchestrator: FraudOrchestrator,

    /// Rule administration service
    pub admin: RuleAdmin,

    /// Audit log read by the history endpoints
    pub audit: Arc<dyn AuditLog>,

    pub metrics: Arc<MetricsRegistry>,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    pub fn new(
        orchestrator: FraudOrchestrator,
        admin: RuleAdmin,
        audit: Arc<dyn AuditLog>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        AppState {
            orchestrator,
            admin,
            audit,
            metrics,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/transactions/assess", post(handle_assess))
        .route("/v1/transactions/history/:subject_id", get(handle_history))
        .route("/v1/audit", get(handle_audit))
        .route("/v1/rules", get(handle_list_rules).post(handle_create_rule))
        .route("/v1/rules/dashboard", get(handle_dashboard))
        .route(
            "/v1/rules/:id",
            get(handle_get_rule)
                .put(handle_update_rule)
                .delete(handle_delete_rule),
        )
        .route("/v1/rules/:id/toggle", patch(handle_toggle_rule))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assess a transaction. Fraud verdicts are returned with `403`.
async fn handle_assess(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssessRequest>,
) -> Result<Response, ApiError> {
    let assessment = req.to_assessment()?;
    let verdict = state.orchestrator.assess(&assessment).await;

    let body = VerdictResponse::new(assessment.subject_id, verdict);
    Ok((body.status(), Json(body)).into_response())
}

async fn handle_history(
    State(state): State<Arc<AppState>>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let query = AuditQuery::for_subject(SubjectId::new(subject_id)).with_limit(HISTORY_LIMIT);
    Ok(Json(state.audit.list(&query).await?))
}

async fn handle_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.audit.list(&params.to_query()).await?))
}

async fn handle_list_rules(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RuleListParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.list(&params.to_filter()).await?))
}

async fn handle_create_rule(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<NewRule>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.admin.create(rule).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn handle_get_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.get(RuleId(id)).await?))
}

async fn handle_update_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<RuleUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.update(RuleId(id), update).await?))
}

async fn handle_delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.admin.delete(RuleId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_toggle_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.toggle(RuleId(id)).await?))
}

async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.dashboard().await?))
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        registered_predicates: state.orchestrator.engine().registry().len(),
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP fraudr_uptime_seconds Application uptime in seconds
# TYPE fraudr_uptime_seconds counter
fraudr_uptime_seconds {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Applicant, ConditionKey, Gender, Identity, Loan, LoanStatus, NationalId, NidStatus};
    use crate::orchestrator::{ScoringPolicy, Verifiers};
    use crate::storage::{MemoryStorage, RuleStore};
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    const NID: &str = "123456789012";

    async fn test_app() -> (Arc<MemoryStorage>, Router) {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_applicant(Applicant {
            subject_id: SubjectId::new(1),
            first_name: "Alemayehu".to_string(),
            last_name: "Tsegaye".to_string(),
            gender: Gender::new("M"),
            phone_number: "+251911000001".to_string(),
            tin_number: None,
            national_id: Some(NationalId::new(NID)),
        });
        storage.add_identity(Identity {
            subject_id: SubjectId::new(1),
            name: "Alemayehu Tsegaye".to_string(),
            national_id: NationalId::new(NID),
            date_of_birth: Some("1985-03-15".to_string()),
            gender: Some(Gender::new("M")),
            nid_status: NidStatus::Active,
        });
        storage.add_blacklisted(&NationalId::new("999999999999"), "Known fraud");
        storage.add_identity(Identity {
            subject_id: SubjectId::new(2),
            name: "Blocked Person".to_string(),
            national_id: NationalId::new("999999999999"),
            date_of_birth: None,
            gender: None,
            nid_status: NidStatus::Active,
        });
        storage
            .create_rule(&crate::domain::NewRule {
                name: "Active Loan Check".to_string(),
                description: "Fraud if applicant has active loan".to_string(),
                condition_key: ConditionKey::ActiveLoan,
                is_active: true,
            })
            .await
            .unwrap();

        let metrics = Arc::new(MetricsRegistry::new());
        let orchestrator = FraudOrchestrator::from_storage(
            storage.clone(),
            storage.clone(),
            Verifiers::default(),
            ScoringPolicy::Binary,
            metrics.clone(),
        );
        let admin = RuleAdmin::new(storage.clone(), storage.clone());
        let state = Arc::new(AppState::new(orchestrator, admin, storage.clone(), metrics));

        (storage, create_router(state))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assess_body(nid: &str) -> serde_json::Value {
        serde_json::json!({
            "subject_id": 1,
            "amount": "250.00",
            "source_address": "192.168.1.100",
            "national_id": nid,
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_, app) = test_app().await;

        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["registered_predicates"], 9);
    }

    #[tokio::test]
    async fn test_assess_approved() {
        let (storage, app) = test_app().await;

        let response = app
            .oneshot(json_request("POST", "/v1/transactions/assess", assess_body(NID)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["is_fraud"], false);
        assert_eq!(body["reason"], "Approved");
        assert_eq!(storage.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_assess_fraud_is_forbidden() {
        let (storage, app) = test_app().await;
        storage.add_loan(Loan {
            subject_id: SubjectId::new(1),
            amount: Decimal::new(1000, 0),
            status: LoanStatus::Approved,
            is_active: true,
        });

        let response = app
            .oneshot(json_request("POST", "/v1/transactions/assess", assess_body(NID)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["reason"], "Fraud if applicant has active loan");
        assert_eq!(body["risk_score"], 1.0);
    }

    #[tokio::test]
    async fn test_assess_blacklisted() {
        let (storage, app) = test_app().await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/transactions/assess",
                assess_body("999999999999"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["reason"], "National ID blacklisted");
        assert!(storage.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let (_, app) = test_app().await;

        for _ in 0..2 {
            app.clone()
                .oneshot(json_request("POST", "/v1/transactions/assess", assess_body(NID)))
                .await
                .unwrap();
        }

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/v1/transactions/history/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

        let response = app
            .oneshot(empty_request("GET", "/v1/audit?subject_id=1&limit=1"))
            .await
            .unwrap();
        let entries = body_json(response).await;
        assert_eq!(entries.as_array().unwrap().len(), 1);
        assert_eq!(entries[0]["reason"], "None");
    }

    #[tokio::test]
    async fn test_rule_crud() {
        let (_, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/rules",
                serde_json::json!({
                    "name": "NID Expired",
                    "description": "Fraud if NID has expired",
                    "condition_key": "nid_expired"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["is_active"], true);

        let response = app
            .clone()
            .oneshot(empty_request("PATCH", &format!("/v1/rules/{}/toggle", id)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["is_active"], false);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/v1/rules?active=true"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/v1/rules/{}", id),
                serde_json::json!({"description": "NID expired"}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["description"], "NID expired");

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &format!("/v1/rules/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("GET", &format!("/v1/rules/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_rule_validation() {
        let (_, app) = test_app().await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/rules",
                serde_json::json!({"name": " ", "condition_key": "active_loan"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_dashboard_endpoint() {
        let (_, app) = test_app().await;

        let response = app
            .oneshot(empty_request("GET", "/v1/rules/dashboard"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_rules"], 1);
        assert_eq!(body["active_rules"], 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (_, app) = test_app().await;

        app.clone()
            .oneshot(json_request("POST", "/v1/transactions/assess", assess_body(NID)))
            .await
            .unwrap();

        let response = app.oneshot(empty_request("GET", "/metrics")).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains("fraudr_assessments_total 1"));
        assert!(text.contains("fraudr_uptime_seconds"));
    }
}
