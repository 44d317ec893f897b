//! Governed HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use super::health::HealthRegistry;
use crate::audit::{redact_map, AuditAction, AuditContext};
use crate::errors::{AppError, FieldViolation, ValidationErrors};
use crate::governance::{Governance, GovernanceFailure, GovernedCall};
use crate::ratelimit::PolicyClass;
use crate::security::{
    generate_secure_token, has_sql_injection_patterns, mask_secret, normalize_email,
    sanitize_html, validate_file_upload, FileUpload, UploadPolicy, DEFAULT_TOKEN_BYTES,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub governance: Governance,
    pub health: Arc<HealthRegistry>,
    pub uploads: Arc<UploadPolicy>,
    pub started: Instant,
}

impl AppState {
    pub fn new(governance: Governance) -> Self {
        Self {
            governance,
            health: Arc::new(HealthRegistry::new()),
            uploads: Arc::new(UploadPolicy::default()),
            started: Instant::now(),
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Arc::new(health);
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/uploads/validate", post(validate_upload))
        .route("/api/reports", post(create_report))
        .route("/api/tokens", post(issue_token))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.report(state.started.elapsed()).await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text(), None))
}

async fn validate_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<FileUpload>, JsonRejection>,
) -> Result<Json<Value>, GovernanceFailure> {
    let context = match &payload {
        Ok(Json(file)) => AuditContext::new()
            .resource("Upload", None)
            .meta("mimeType", file.mime_type.clone())
            .meta("size", file.size),
        Err(_) => AuditContext::new().resource("Upload", None),
    };
    let call = GovernedCall::from_headers(PolicyClass::Api, AuditAction::ResourceCreate, &headers)
        .with_context(context);
    let policy = Arc::clone(&state.uploads);

    state
        .governance
        .run(call, || async move {
            let file = parse_body(payload)?;
            validate_file_upload(&file, &policy).map_err(AppError::from)?;
            Ok(Json(json!({ "valid": true })))
        })
        .await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest {
    title: String,
    #[serde(default)]
    contact_email: Option<String>,
}

async fn create_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GovernanceFailure> {
    let mut metadata = serde_json::Map::new();
    if let Ok(Json(request)) = &payload {
        metadata.insert("title".to_string(), json!(request.title));
        if let Some(email) = &request.contact_email {
            metadata.insert("contactEmail".to_string(), json!(email));
        }
    }
    let context = AuditContext {
        metadata: redact_map(&metadata),
        ..AuditContext::new().resource("Report", None)
    };
    let call = GovernedCall::from_headers(PolicyClass::Report, AuditAction::ExportGenerate, &headers)
        .with_context(context);

    state
        .governance
        .run(call, || async move {
            let request = parse_body(payload)?;

            if has_sql_injection_patterns(&request.title) {
                warn!(title = %request.title, "Report title looks like SQL injection");
            }

            let mut violations = ValidationErrors::new();
            let title = sanitize_html(&request.title);
            if title.is_empty() {
                violations.push(FieldViolation::field("title", "Title is required"));
            }
            let contact_email = match request.contact_email.as_deref() {
                Some(raw) => normalize_email("contactEmail", raw)
                    .map_err(|v| violations.push(v))
                    .ok(),
                None => None,
            };
            violations.into_result()?;

            let id = Uuid::new_v4();
            debug!(report_id = %id, "Report queued");
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "id": id,
                    "title": title,
                    "contactEmail": contact_email,
                    "createdAt": Utc::now(),
                })),
            ))
        })
        .await
}

async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, GovernanceFailure> {
    let call = GovernedCall::from_headers(PolicyClass::Auth, AuditAction::UserLogin, &headers);

    state
        .governance
        .run(call, || async {
            let token = generate_secure_token(DEFAULT_TOKEN_BYTES);
            debug!(token = %mask_secret(&token), "Issued token");
            Ok(Json(json!({ "token": token })))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditRecorder, MemorySink};
    use crate::config::Mode;
    use crate::errors::ErrorClassifier;
    use crate::http::health::tests::FixedCheck;
    use crate::ratelimit::{InMemoryCounterStore, PolicyCatalogue, RateLimiter, SystemClock};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Router, MemorySink) {
        let sink = MemorySink::new();
        let limiter = RateLimiter::with_store(InMemoryCounterStore::new(), Arc::new(SystemClock::new()))
            .with_sweep_probability(0.0);
        let governance = Governance::new(
            Arc::new(limiter),
            AuditRecorder::new(Arc::new(sink.clone())),
            ErrorClassifier::new(Mode::Production),
            PolicyCatalogue::new(),
        );
        (router(AppState::new(governance)), sink)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "192.0.2.10")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_ok() {
        let (app, _) = app();

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_health_unavailable_when_check_fails() {
        let limiter = RateLimiter::new();
        let governance = Governance::new(
            Arc::new(limiter),
            AuditRecorder::new(Arc::new(MemorySink::new())),
            ErrorClassifier::new(Mode::Test),
            PolicyCatalogue::new(),
        );
        let health = HealthRegistry::new().register(Arc::new(FixedCheck {
            name: "database",
            result: Err("down".to_string()),
        }));
        let app = router(AppState::new(governance).with_health(health));

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["checks"]["database"], "failing");
    }

    #[tokio::test]
    async fn test_upload_accepted_and_audited() {
        let (app, sink) = app();

        let response = app
            .oneshot(post_json(
                "/api/uploads/validate",
                json!({ "name": "cat.png", "type": "image/png", "size": 2048 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "valid": true }));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action(), AuditAction::ResourceCreate);
        assert_eq!(events[0].caller_ip(), Some("192.0.2.10"));
        assert_eq!(events[0].metadata()["mimeType"], "image/png");
    }

    #[tokio::test]
    async fn test_upload_rejected_with_field_error() {
        let (app, sink) = app();

        let response = app
            .oneshot(post_json(
                "/api/uploads/validate",
                json!({ "name": "run.exe", "type": "application/x-msdownload", "size": 10 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["errors"]["file"][0], "File type application/x-msdownload is not allowed");
        assert!(!sink.events()[0].succeeded());
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_error() {
        let (app, _) = app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/uploads/validate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_report_title_sanitized() {
        let (app, sink) = app();

        let response = app
            .oneshot(post_json(
                "/api/reports",
                json!({ "title": " <b>Q3</b> revenue ", "contactEmail": "Ops@Example.com" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Q3 revenue");
        assert_eq!(body["contactEmail"], "ops@example.com");
        assert!(Uuid::parse_str(body["id"].as_str().unwrap()).is_ok());

        let event = &sink.events()[0];
        assert_eq!(event.metadata()["contactEmail"], crate::audit::REDACTED);
    }

    #[tokio::test]
    async fn test_report_requires_title_and_valid_email() {
        let (app, _) = app();

        let response = app
            .oneshot(post_json(
                "/api/reports",
                json!({ "title": "<i></i>", "contactEmail": "nope" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["errors"]["title"][0], "Title is required");
        assert_eq!(body["errors"]["contactEmail"][0], "Invalid email");
    }

    #[tokio::test]
    async fn test_token_endpoint_rate_limited() {
        let (app, sink) = app();

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(post_json("/api/tokens", json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let token = body_json(response).await["token"].as_str().unwrap().to_string();
            assert_eq!(token.len(), DEFAULT_TOKEN_BYTES * 2);
        }

        let response = app.oneshot(post_json("/api/tokens", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert!(response.headers().contains_key("retry-after"));
        assert_eq!(body_json(response).await["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(sink.len(), 5);
    }
}
