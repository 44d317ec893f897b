//! Classification of arbitrary failures into caller-safe responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use super::app::{AppError, FieldErrors};
use super::persistence::{ConstraintKind, PersistenceError};
use super::validation::ValidationErrors;
use crate::config::Mode;

/// Message returned for unrecognised failures outside development.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// The caller-facing shape of a failure.
///
/// Serializes to `{ "error", "code", "errors"?, "stack"? }`; the status travels
/// as the HTTP status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    /// HTTP status
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Message safe to show the caller
    #[serde(rename = "error")]
    pub message: String,
    /// Stable machine-readable code
    pub code: String,
    /// Per-field validation messages
    #[serde(rename = "errors", skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    /// Debug trace, only ever set outside production
    #[serde(rename = "stack", skip_serializing_if = "Option::is_none")]
    pub debug_details: Option<String>,
}

impl ClassifiedError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.to_string(),
            field_errors: None,
            debug_details: None,
        }
    }
}

impl From<&AppError> for ClassifiedError {
    fn from(err: &AppError) -> Self {
        Self {
            status: err.status(),
            message: err.message().to_string(),
            code: err.code().to_string(),
            field_errors: err.field_errors().cloned(),
            debug_details: None,
        }
    }
}

impl IntoResponse for ClassifiedError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Turns any failure into a [`ClassifiedError`].
///
/// Precedence, first match wins, searching the whole source chain for each:
/// application errors, schema violations, known persistence constraint
/// violations, then everything else as an internal error.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    mode: Mode,
}

impl ErrorClassifier {
    /// Create a classifier for an environment.
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// The environment this classifier sanitizes for.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Classify a failure. The raw error is always logged first.
    pub fn classify(&self, err: &anyhow::Error) -> ClassifiedError {
        error!(error = %err, detail = ?err, "Request failed");

        if let Some(app) = find::<AppError>(err) {
            return ClassifiedError::from(app);
        }

        if let Some(violations) = find::<ValidationErrors>(err) {
            let mut classified = ClassifiedError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                ValidationErrors::MESSAGE,
            );
            classified.field_errors = Some(violations.field_errors());
            return classified;
        }

        if let Some(classified) = find::<PersistenceError>(err).and_then(classify_persistence) {
            return classified;
        }

        if self.mode.exposes_internals() {
            let mut classified = ClassifiedError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            );
            classified.debug_details = Some(format!("{:?}", err));
            classified
        } else {
            ClassifiedError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                GENERIC_ERROR_MESSAGE,
            )
        }
    }
}

fn find<E>(err: &anyhow::Error) -> Option<&E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    // downcast_ref also matches a context value attached with `.context(..)`
    err.downcast_ref::<E>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<E>()))
}

fn classify_persistence(err: &PersistenceError) -> Option<ClassifiedError> {
    match err.kind {
        ConstraintKind::UniqueViolation { .. } => Some(ClassifiedError::new(
            StatusCode::CONFLICT,
            "DUPLICATE",
            "A record with this value already exists",
        )),
        ConstraintKind::RecordNotFound => Some(ClassifiedError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Record not found",
        )),
        ConstraintKind::ForeignKeyViolation { .. } => Some(ClassifiedError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_REFERENCE",
            "Related record not found",
        )),
        ConstraintKind::Other { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FieldViolation, PersistenceError};
    use anyhow::Context;

    fn dev() -> ErrorClassifier {
        ErrorClassifier::new(Mode::Development)
    }

    fn prod() -> ErrorClassifier {
        ErrorClassifier::new(Mode::Production)
    }

    #[test]
    fn test_app_error_passes_through() {
        let mut fields = FieldErrors::new();
        fields.insert("name".to_string(), vec!["Required".to_string()]);
        let err = anyhow::Error::new(AppError::validation("Bad input", Some(fields.clone())));

        let classified = prod().classify(&err);
        assert_eq!(classified.status, StatusCode::BAD_REQUEST);
        assert_eq!(classified.code, "VALIDATION_ERROR");
        assert_eq!(classified.message, "Bad input");
        assert_eq!(classified.field_errors, Some(fields));
        assert_eq!(classified.debug_details, None);
    }

    #[test]
    fn test_app_error_found_behind_context() {
        let err = Err::<(), _>(AppError::forbidden())
            .context("loading report")
            .unwrap_err();

        let classified = prod().classify(&err);
        assert_eq!(classified.status, StatusCode::FORBIDDEN);
        assert_eq!(classified.message, "Permission denied");
    }

    #[test]
    fn test_schema_violations() {
        let mut violations = ValidationErrors::new();
        violations.push(FieldViolation::field("email", "Invalid email"));
        violations.push(FieldViolation::form("Something else"));

        let classified = prod().classify(&anyhow::Error::new(violations));
        assert_eq!(classified.status, StatusCode::BAD_REQUEST);
        assert_eq!(classified.code, "VALIDATION_ERROR");
        assert_eq!(classified.message, "Validation failed");
        let fields = classified.field_errors.unwrap();
        assert_eq!(fields["email"], vec!["Invalid email"]);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_persistence_constraints() {
        let cases = [
            (PersistenceError::unique(["email"]), 409, "DUPLICATE"),
            (PersistenceError::record_not_found(), 404, "NOT_FOUND"),
            (PersistenceError::foreign_key("owner_id"), 400, "INVALID_REFERENCE"),
        ];

        for (err, status, code) in cases {
            let classified = prod().classify(&anyhow::Error::new(err));
            assert_eq!(classified.status.as_u16(), status);
            assert_eq!(classified.code, code);
        }
    }

    #[test]
    fn test_persistence_driver_message_never_leaks() {
        let classified = dev().classify(&anyhow::Error::new(PersistenceError::unique(["email"])));
        assert_eq!(classified.message, "A record with this value already exists");
    }

    #[test]
    fn test_unknown_persistence_code_is_internal() {
        let err = PersistenceError::new(
            ConstraintKind::Other {
                code: "40001".to_string(),
            },
            "serialization failure",
        );
        let classified = prod().classify(&anyhow::Error::new(err));
        assert_eq!(classified.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(classified.code, "INTERNAL_ERROR");
    }

    #[test]
    fn test_app_error_wins_over_persistence_in_chain() {
        let err = anyhow::Error::new(PersistenceError::record_not_found())
            .context(AppError::not_found("Invoice"));

        let classified = prod().classify(&err);
        assert_eq!(classified.message, "Invoice not found");
    }

    #[test]
    fn test_unrecognized_error_in_production_is_sanitized() {
        let err = anyhow::anyhow!("connection refused to 10.1.2.3:5432");

        let classified = prod().classify(&err);
        assert_eq!(classified.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(classified.code, "INTERNAL_ERROR");
        assert_eq!(classified.message, GENERIC_ERROR_MESSAGE);
        assert!(classified.debug_details.is_none());

        let body = serde_json::to_string(&classified).unwrap();
        assert!(!body.contains("10.1.2.3"));
        assert!(!body.contains("stack"));
    }

    #[test]
    fn test_unrecognized_error_in_development_is_detailed() {
        let err = anyhow::anyhow!("connection refused").context("loading dashboard");

        let classified = dev().classify(&err);
        assert_eq!(classified.message, "loading dashboard");
        let stack = classified.debug_details.unwrap();
        assert!(stack.contains("connection refused"));
    }

    #[test]
    fn test_serialized_shape() {
        let classified = ClassifiedError::from(&AppError::not_found("Report"));
        let body = serde_json::to_value(&classified).unwrap();

        assert_eq!(
            body,
            serde_json::json!({ "error": "Report not found", "code": "NOT_FOUND" })
        );
    }
}
