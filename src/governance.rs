//! Request governance: admission, audited execution and error translation.
//!
//! Every governed request goes through the same three steps. The caller is
//! counted against the quota of its endpoint class; if admitted, the handler
//! runs inside [`AuditRecorder::wrap`]; if the handler fails, the failure is
//! classified into a caller-safe response.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::audit::{AuditAction, AuditContext, AuditRecorder};
use crate::config::GatehouseConfig;
use crate::errors::{ClassifiedError, ErrorClassifier};
use crate::ratelimit::{
    client_key, CounterStore, InMemoryCounterStore, PolicyCatalogue, PolicyClass,
    RateLimitDecision, RateLimitKey, RateLimiter,
};

/// One request about to be governed.
#[derive(Debug, Clone)]
pub struct GovernedCall {
    /// Whose quota applies
    pub class: PolicyClass,
    /// Caller identity for counting
    pub client: String,
    /// What gets audited
    pub action: AuditAction,
    /// Audit details known up front
    pub context: AuditContext,
}

impl GovernedCall {
    /// A call from `client` with an empty audit context.
    pub fn new(class: PolicyClass, action: AuditAction, client: impl Into<String>) -> Self {
        Self {
            class,
            client: client.into(),
            action,
            context: AuditContext::new(),
        }
    }

    /// A call whose client identity and audit caller details come from
    /// proxy headers.
    pub fn from_headers(class: PolicyClass, action: AuditAction, headers: &HeaderMap) -> Self {
        Self {
            class,
            client: client_key(headers),
            action,
            context: AuditContext::from_headers(headers),
        }
    }

    /// Replace the audit context, keeping the caller details already captured.
    pub fn with_context(mut self, context: AuditContext) -> Self {
        let caller_ip = self.context.caller_ip.take();
        let caller_agent = self.context.caller_agent.take();
        self.context = AuditContext {
            caller_ip: context.caller_ip.or(caller_ip),
            caller_agent: context.caller_agent.or(caller_agent),
            ..context
        };
        self
    }
}

/// A request turned away because its quota is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRejection {
    /// Seconds until the window resets, rounded up
    pub retry_after_secs: u64,
    /// Window reset as milliseconds since the Unix epoch
    pub reset_epoch_millis: i64,
    /// Quota of the applied policy
    pub limit: u32,
}

impl RateLimitRejection {
    /// Message sent to rejected callers.
    pub const MESSAGE: &'static str = "Too many requests. Please try again later.";

    fn from_decision(decision: &RateLimitDecision, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            retry_after_secs: decision.retry_after_secs(now),
            reset_epoch_millis: decision.reset_epoch_millis(),
            limit: decision.limit,
        }
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let headers = [
            (header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs)),
            (
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_static("0"),
            ),
            (
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from(self.reset_epoch_millis),
            ),
        ];
        let body = json!({
            "error": Self::MESSAGE,
            "code": "RATE_LIMIT_EXCEEDED",
        });

        (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
    }
}

/// Why a governed call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceFailure {
    /// Refused before the handler ran
    RateLimited(RateLimitRejection),
    /// The handler ran and failed
    Failed(ClassifiedError),
}

impl IntoResponse for GovernanceFailure {
    fn into_response(self) -> Response {
        match self {
            GovernanceFailure::RateLimited(rejection) => rejection.into_response(),
            GovernanceFailure::Failed(classified) => classified.into_response(),
        }
    }
}

/// Composes the rate limiter, audit recorder and error classifier around
/// request handlers.
pub struct Governance<S: CounterStore = InMemoryCounterStore> {
    limiter: Arc<RateLimiter<S>>,
    recorder: AuditRecorder,
    classifier: ErrorClassifier,
    policies: PolicyCatalogue,
}

impl<S: CounterStore> Clone for Governance<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            recorder: self.recorder.clone(),
            classifier: self.classifier,
            policies: self.policies.clone(),
        }
    }
}

impl Governance<InMemoryCounterStore> {
    /// Build the in-process governance layer described by `config`.
    pub fn from_config(config: &GatehouseConfig) -> Self {
        let limiter = RateLimiter::new()
            .with_enabled(config.rate_limiting.enabled)
            .with_sweep_probability(config.rate_limiting.sweep_probability);
        let recorder = AuditRecorder::console(config.mode).with_enabled(config.audit.enabled);

        Self::new(
            Arc::new(limiter),
            recorder,
            ErrorClassifier::new(config.mode),
            config.rate_limiting.catalogue(),
        )
    }
}

impl<S: CounterStore> Governance<S> {
    /// Assemble a governance layer from its parts.
    pub fn new(
        limiter: Arc<RateLimiter<S>>,
        recorder: AuditRecorder,
        classifier: ErrorClassifier,
        policies: PolicyCatalogue,
    ) -> Self {
        Self {
            limiter,
            recorder,
            classifier,
            policies,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter<S>> {
        &self.limiter
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn policies(&self) -> &PolicyCatalogue {
        &self.policies
    }

    /// Count one request from `client` against the quota of `class`.
    pub async fn admit(
        &self,
        class: PolicyClass,
        client: &str,
    ) -> Result<RateLimitDecision, RateLimitRejection> {
        let key = RateLimitKey::new(class, client);
        let policy = self.policies.get(class);
        let decision = self
            .limiter
            .check_and_consume(&key.to_store_key(), &policy)
            .await;

        if decision.admitted {
            debug!(key = %key, remaining = decision.remaining, "Request admitted");
            return Ok(decision);
        }

        let rejection = RateLimitRejection::from_decision(&decision, self.limiter.now());
        warn!(
            key = %key,
            retry_after_secs = rejection.retry_after_secs,
            "Request rejected by rate limit"
        );
        Err(rejection)
    }

    /// Admit, run `handler` under audit, and classify any failure.
    ///
    /// Rejected calls never reach the handler and are not audited.
    #[instrument(skip_all, fields(class = %call.class, action = %call.action))]
    pub async fn run<T, F, Fut>(&self, call: GovernedCall, handler: F) -> Result<T, GovernanceFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.admit(call.class, &call.client)
            .await
            .map_err(GovernanceFailure::RateLimited)?;

        self.recorder
            .wrap(call.action, call.context, handler)
            .await
            .map_err(|err| GovernanceFailure::Failed(self.classifier.classify(&err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::config::Mode;
    use crate::errors::{AppError, GENERIC_ERROR_MESSAGE};
    use crate::ratelimit::ManualClock;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        governance: Governance,
        clock: ManualClock,
        sink: MemorySink,
    }

    fn start() -> DateTime<Utc> {
        "2025-03-01T12:00:00Z".parse().unwrap()
    }

    fn harness(mode: Mode) -> Harness {
        let clock = ManualClock::new(start());
        let sink = MemorySink::new();
        let limiter = RateLimiter::with_store(InMemoryCounterStore::new(), Arc::new(clock.clone()))
            .with_sweep_probability(0.0);

        let governance = Governance::new(
            Arc::new(limiter),
            AuditRecorder::new(Arc::new(sink.clone())),
            ErrorClassifier::new(mode),
            PolicyCatalogue::new(),
        );

        Harness {
            governance,
            clock,
            sink,
        }
    }

    fn login(client: &str) -> GovernedCall {
        GovernedCall::new(PolicyClass::Auth, AuditAction::UserLogin, client)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_admitted_call_is_audited() {
        let h = harness(Mode::Test);
        let call = login("203.0.113.1").with_context(AuditContext::new().actor("user-1"));

        let value = h.governance.run(call, || async { Ok("welcome") }).await.unwrap();

        assert_eq!(value, "welcome");
        let events = h.sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].succeeded());
        assert_eq!(events[0].actor_id(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_exhausted_quota_skips_handler_and_audit() {
        let h = harness(Mode::Test);
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            h.governance
                .run(login("203.0.113.1"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }

        let result = h
            .governance
            .run(login("203.0.113.1"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(GovernanceFailure::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(h.sink.len(), 5);
    }

    #[tokio::test]
    async fn test_quota_is_per_client_and_class() {
        let h = harness(Mode::Test);

        for _ in 0..5 {
            assert_ok!(h.governance.admit(PolicyClass::Auth, "a").await);
        }
        assert_err!(h.governance.admit(PolicyClass::Auth, "a").await);
        assert_ok!(h.governance.admit(PolicyClass::Auth, "b").await);

        let decision = assert_ok!(h.governance.admit(PolicyClass::Api, "a").await);
        assert_eq!(decision.remaining, 59);
    }

    #[tokio::test]
    async fn test_rejection_response() {
        let h = harness(Mode::Test);
        for _ in 0..5 {
            h.governance.admit(PolicyClass::Report, "c").await.unwrap();
        }

        h.clock.advance(Duration::milliseconds(1_500));
        let rejection = h.governance.admit(PolicyClass::Report, "c").await.unwrap_err();
        assert_eq!(rejection.retry_after_secs, 59);
        let reset = start() + Duration::milliseconds(60_000);
        assert_eq!(rejection.reset_epoch_millis, reset.timestamp_millis());

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "59");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(
            response.headers()["x-ratelimit-reset"],
            reset.timestamp_millis().to_string().as_str()
        );
        assert_eq!(
            body_json(response).await,
            json!({
                "error": "Too many requests. Please try again later.",
                "code": "RATE_LIMIT_EXCEEDED"
            })
        );
    }

    #[tokio::test]
    async fn test_quota_returns_after_window() {
        let h = harness(Mode::Test);
        for _ in 0..3 {
            h.governance.admit(PolicyClass::Register, "d").await.unwrap();
        }
        assert!(h.governance.admit(PolicyClass::Register, "d").await.is_err());

        h.clock.advance(Duration::hours(1));
        let rejection = h.governance.admit(PolicyClass::Register, "d").await.unwrap_err();
        assert_eq!(rejection.retry_after_secs, 0);

        h.clock.advance(Duration::milliseconds(1));
        let decision = h.governance.admit(PolicyClass::Register, "d").await.unwrap();
        assert_eq!(decision.remaining, 2);
    }

    #[tokio::test]
    async fn test_handler_failure_is_classified_and_audited() {
        let h = harness(Mode::Production);

        let failure = h
            .governance
            .run(login("e"), || async {
                Err::<(), _>(AppError::not_found("Report").into())
            })
            .await
            .unwrap_err();

        let GovernanceFailure::Failed(classified) = failure else {
            panic!("expected a classified failure");
        };
        assert_eq!(classified.status, StatusCode::NOT_FOUND);
        assert_eq!(classified.message, "Report not found");

        let events = h.sink.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].succeeded());
        assert_eq!(events[0].error_message(), Some("Report not found"));
    }

    #[tokio::test]
    async fn test_internal_failure_sanitized_in_production() {
        let h = harness(Mode::Production);

        let failure = h
            .governance
            .run(login("f"), || async {
                Err::<(), _>(anyhow::anyhow!("password for db at 10.0.0.5 rejected"))
            })
            .await
            .unwrap_err();

        let response = failure.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": GENERIC_ERROR_MESSAGE, "code": "INTERNAL_ERROR" })
        );

        // operators still see the raw message in the audit trail
        assert_eq!(
            h.sink.events()[0].error_message(),
            Some("password for db at 10.0.0.5 rejected")
        );
    }

    #[tokio::test]
    async fn test_call_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.7, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("test-agent"));

        let call = GovernedCall::from_headers(PolicyClass::Api, AuditAction::ResourceRead, &headers)
            .with_context(AuditContext::new().actor("user-9"));

        assert_eq!(call.client, "198.51.100.7");
        assert_eq!(call.context.actor_id.as_deref(), Some("user-9"));
        assert_eq!(call.context.caller_ip.as_deref(), Some("198.51.100.7, 10.0.0.1"));
        assert_eq!(call.context.caller_agent.as_deref(), Some("test-agent"));
    }

    #[tokio::test]
    async fn test_disabled_limiting_admits_everything() {
        let config = GatehouseConfig {
            rate_limiting: crate::config::RateLimitingConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let governance = Governance::from_config(&config);

        for _ in 0..20 {
            assert!(governance.admit(PolicyClass::Auth, "g").await.is_ok());
        }
    }
}
