//! Destinations for audit events.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

use super::event::AuditEvent;
use crate::config::Mode;

/// Errors a sink can report. The recorder logs and swallows them.
#[derive(Debug, Error)]
pub enum AuditSinkError {
    #[error("failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write audit event: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Where audit events go.
///
/// A durable store (database table, log shipper) plugs in here.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Write one event.
    async fn emit(&self, event: &AuditEvent) -> Result<(), AuditSinkError>;
}

/// Writes events to standard error.
///
/// Outside production each event is pretty-printed after an `[AUDIT]` prefix.
/// In production each event is one JSON line tagged `"type": "audit"` for the
/// log pipeline to pick up.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    mode: Mode,
}

#[derive(Serialize)]
struct TaggedLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

impl ConsoleSink {
    /// Create a console sink formatting for `mode`.
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// The text written for one event, without trailing newline.
    pub fn render(&self, event: &AuditEvent) -> Result<String, AuditSinkError> {
        if self.mode.is_production() {
            let line = TaggedLine {
                kind: "audit",
                event,
            };
            Ok(serde_json::to_string(&line)?)
        } else {
            Ok(format!("[AUDIT] {}", serde_json::to_string_pretty(event)?))
        }
    }
}

#[async_trait]
impl AuditSink for ConsoleSink {
    async fn emit(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        let text = self.render(event)?;
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{}", text)?;
        Ok(())
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Number of events emitted so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn emit(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, AuditContext};
    use chrono::Utc;

    fn event() -> AuditEvent {
        let entry = AuditContext::new()
            .actor("user-1")
            .into_entry(AuditAction::UserLogin, true);
        AuditEvent::stamp(entry, Utc::now())
    }

    #[test]
    fn test_production_render_is_single_tagged_line() {
        let text = ConsoleSink::new(Mode::Production).render(&event()).unwrap();

        assert!(!text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "audit");
        assert_eq!(value["action"], "user.login");
        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_development_render_is_human_readable() {
        let text = ConsoleSink::new(Mode::Development).render(&event()).unwrap();

        assert!(text.starts_with("[AUDIT] {\n"));
        assert!(!text.contains("\"type\""));
    }

    #[tokio::test]
    async fn test_memory_sink_collects_events() {
        let sink = MemorySink::new();
        let shared = sink.clone();
        assert!(sink.is_empty());

        sink.emit(&event()).await.unwrap();
        sink.emit(&event()).await.unwrap();

        assert_eq!(shared.len(), 2);
        assert_eq!(shared.events()[0].action(), AuditAction::UserLogin);
    }
}
