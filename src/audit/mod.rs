//! Structured audit trail for governed operations.
//!
//! An [`AuditContext`] describes who is doing what before the work runs,
//! [`AuditRecorder::wrap`] runs the work and emits one [`AuditEvent`] through
//! an [`AuditSink`].

mod event;
mod recorder;
mod redact;
mod sink;

pub use event::{AuditAction, AuditContext, AuditEntry, AuditEvent};
pub use recorder::{AuditRecorder, UNKNOWN_ERROR_MESSAGE};
pub use redact::{is_sensitive_key, redact, redact_map, REDACTED};
pub use sink::{AuditSink, AuditSinkError, ConsoleSink, MemorySink};
