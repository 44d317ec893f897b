//! Records audit events around governed operations.

use chrono::Utc;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::event::{AuditAction, AuditContext, AuditEntry, AuditEvent};
use super::sink::{AuditSink, ConsoleSink};
use crate::config::Mode;

/// Message recorded when a failure renders as an empty string.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Stamps entries and hands them to a sink.
///
/// Recording never fails the operation being audited: sink errors are logged
/// and dropped.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    enabled: bool,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl AuditRecorder {
    /// Recorder writing to `sink`.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            enabled: true,
        }
    }

    /// Recorder writing to standard error, formatted for `mode`.
    pub fn console(mode: Mode) -> Self {
        Self::new(Arc::new(ConsoleSink::new(mode)))
    }

    /// Turn recording on or off. A disabled recorder drops every entry.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stamp `entry` with the current time and emit it.
    pub async fn record(&self, entry: AuditEntry) {
        if !self.enabled {
            return;
        }

        let event = AuditEvent::stamp(entry, Utc::now());
        debug!(action = %event.action(), success = event.succeeded(), "Recording audit event");

        if let Err(e) = self.sink.emit(&event).await {
            warn!(error = %e, action = %event.action(), "Failed to record audit event");
        }
    }

    /// Run `handler` and record exactly one event describing how it went.
    ///
    /// The elapsed time lands in the event metadata as `durationMs`. The
    /// handler's result, success or failure, is returned untouched.
    pub async fn wrap<T, E, F, Fut>(
        &self,
        action: AuditAction,
        context: AuditContext,
        handler: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = handler().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let context = context.meta("durationMs", Value::from(elapsed_ms));
        let entry = match &result {
            Ok(_) => context.into_entry(action, true),
            Err(e) => {
                let message = e.to_string();
                let message = if message.is_empty() {
                    UNKNOWN_ERROR_MESSAGE.to_string()
                } else {
                    message
                };
                context.into_entry(action, false).with_error(message)
            }
        };

        self.record(entry).await;
        result
    }
}
