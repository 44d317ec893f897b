//! Health reporting for load balancers and uptime monitors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// A dependency the service needs in order to be useful.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Name shown under `checks` in the report.
    fn name(&self) -> &str;

    /// Probe the dependency. The error text is logged, not returned to callers.
    async fn check(&self) -> Result<(), String>;
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub checks: BTreeMap<String, &'static str>,
    pub response_time_ms: u64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// The set of checks behind the health endpoint.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check. Checks run in registration order.
    pub fn register(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Run every check and summarise.
    pub async fn report(&self, uptime: Duration) -> HealthReport {
        let started = Instant::now();
        let mut checks = BTreeMap::new();
        let mut healthy = true;

        for check in &self.checks {
            let outcome = match check.check().await {
                Ok(()) => "ok",
                Err(reason) => {
                    warn!(check = check.name(), reason = %reason, "Health check failed");
                    healthy = false;
                    "failing"
                }
            };
            checks.insert(check.name().to_string(), outcome);
        }

        HealthReport {
            status: if healthy { "healthy" } else { "unhealthy" },
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: uptime.as_secs(),
            checks,
            response_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}
