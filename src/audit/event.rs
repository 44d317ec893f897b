//! Audit event schema and types.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// What a governed operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "user.login")]
    UserLogin,
    #[serde(rename = "user.logout")]
    UserLogout,
    #[serde(rename = "user.register")]
    UserRegister,
    #[serde(rename = "user.password_change")]
    UserPasswordChange,
    #[serde(rename = "user.delete")]
    UserDelete,
    #[serde(rename = "resource.create")]
    ResourceCreate,
    #[serde(rename = "resource.read")]
    ResourceRead,
    #[serde(rename = "resource.update")]
    ResourceUpdate,
    #[serde(rename = "resource.delete")]
    ResourceDelete,
    #[serde(rename = "export.generate")]
    ExportGenerate,
    #[serde(rename = "admin.action")]
    AdminAction,
}

impl AuditAction {
    /// Dotted tag as written to the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserLogin => "user.login",
            AuditAction::UserLogout => "user.logout",
            AuditAction::UserRegister => "user.register",
            AuditAction::UserPasswordChange => "user.password_change",
            AuditAction::UserDelete => "user.delete",
            AuditAction::ResourceCreate => "resource.create",
            AuditAction::ResourceRead => "resource.read",
            AuditAction::ResourceUpdate => "resource.update",
            AuditAction::ResourceDelete => "resource.delete",
            AuditAction::ExportGenerate => "export.generate",
            AuditAction::AdminAction => "admin.action",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything about a governed operation that is known before it runs.
///
/// Metadata is recorded as given; pass it through
/// [`redact`](super::redact) first if it may hold credentials or PII.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditContext {
    /// Who acted; `None` for anonymous callers
    pub actor_id: Option<String>,
    /// Kind of resource touched
    pub resource_type: Option<String>,
    /// Identifier of the resource touched
    pub resource_id: Option<String>,
    /// Free-form detail
    pub metadata: Map<String, Value>,
    /// Caller address as reported by the proxy
    pub caller_ip: Option<String>,
    /// Caller user agent
    pub caller_agent: Option<String>,
}

impl AuditContext {
    /// Empty context for an anonymous caller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the caller's `x-forwarded-for` and `user-agent` headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            caller_ip: header("x-forwarded-for"),
            caller_agent: header("user-agent"),
            ..Self::default()
        }
    }

    /// Set the acting principal.
    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Set the resource type and, optionally, its id.
    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: Option<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = resource_id;
        self
    }

    /// Add one metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Turn this context into an entry describing the outcome.
    pub fn into_entry(self, action: AuditAction, succeeded: bool) -> AuditEntry {
        AuditEntry {
            action,
            context: self,
            succeeded,
            error_message: None,
        }
    }
}

/// An audit event before it has been stamped with a time.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// What was attempted
    pub action: AuditAction,
    /// Who, on what, from where
    pub context: AuditContext,
    /// Whether it worked
    pub succeeded: bool,
    /// Why it did not
    pub error_message: Option<String>,
}

impl AuditEntry {
    /// Attach a failure message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A recorded audit event. Immutable once built.
///
/// Serializes with the field names downstream log pipelines expect:
/// `timestamp`, `action`, `userId`, `resourceType`, `resourceId`, `metadata`,
/// `ipAddress`, `userAgent`, `success`, `errorMessage`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    timestamp: DateTime<Utc>,
    action: AuditAction,
    #[serde(rename = "userId")]
    actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
    #[serde(rename = "ipAddress", skip_serializing_if = "Option::is_none")]
    caller_ip: Option<String>,
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    caller_agent: Option<String>,
    #[serde(rename = "success")]
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl AuditEvent {
    /// Stamp an entry with the time it is recorded.
    pub fn stamp(entry: AuditEntry, timestamp: DateTime<Utc>) -> Self {
        let AuditEntry {
            action,
            context,
            succeeded,
            error_message,
        } = entry;

        Self {
            timestamp,
            action,
            actor_id: context.actor_id,
            resource_type: context.resource_type,
            resource_id: context.resource_id,
            metadata: context.metadata,
            caller_ip: context.caller_ip,
            caller_agent: context.caller_agent,
            succeeded,
            error_message,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn caller_ip(&self) -> Option<&str> {
        self.caller_ip.as_deref()
    }

    pub fn caller_agent(&self) -> Option<&str> {
        self.caller_agent.as_deref()
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_action_serializes_as_dotted_tag() {
        assert_eq!(
            serde_json::to_value(AuditAction::UserPasswordChange).unwrap(),
            json!("user.password_change")
        );
        assert_eq!(AuditAction::ExportGenerate.to_string(), "export.generate");
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.5"));

        let ctx = AuditContext::from_headers(&headers).actor("user-42");
        assert_eq!(ctx.caller_ip.as_deref(), Some("203.0.113.9, 10.0.0.1"));
        assert_eq!(ctx.caller_agent.as_deref(), Some("curl/8.5"));
        assert_eq!(ctx.actor_id.as_deref(), Some("user-42"));
    }

    #[test]
    fn test_event_wire_format() {
        let timestamp = "2025-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap();
        let entry = AuditContext::new()
            .resource("Report", Some("r-1".to_string()))
            .meta("durationMs", 12)
            .into_entry(AuditAction::ExportGenerate, false)
            .with_error("boom");

        let event = AuditEvent::stamp(entry, timestamp);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({
                "timestamp": "2025-01-02T03:04:05Z",
                "action": "export.generate",
                "userId": null,
                "resourceType": "Report",
                "resourceId": "r-1",
                "metadata": { "durationMs": 12 },
                "success": false,
                "errorMessage": "boom"
            })
        );
    }
}
