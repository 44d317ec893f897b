//! Application errors raised by handlers.
//!
//! One sum type covers the whole request-level taxonomy. Each kind maps to
//! exactly one HTTP status and one stable machine-readable code.

use axum::http::StatusCode;
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name to the list of messages describing what is wrong with it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Category of an application error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-policy input
    Validation,
    /// No verified principal
    Authentication,
    /// Verified principal lacks permission
    Authorization,
    /// Referenced entity is absent
    NotFound,
    /// Quota exhausted
    RateLimitExceeded,
    /// Uniqueness violation
    Conflict,
    /// Foreign-key violation
    InvalidReference,
    /// Unclassified failure
    Internal,
    /// An error with its own status and code
    Custom {
        /// HTTP status to respond with
        status: StatusCode,
        /// Stable machine-readable code
        code: Cow<'static, str>,
    },
}

impl ErrorKind {
    /// HTTP status for this kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidReference => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Custom { status, .. } => *status,
        }
    }

    /// Stable code for this kind.
    pub fn code(&self) -> &str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "AUTHENTICATION_ERROR",
            ErrorKind::Authorization => "AUTHORIZATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Conflict => "DUPLICATE",
            ErrorKind::InvalidReference => "INVALID_REFERENCE",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::Custom { code, .. } => &**code,
        }
    }
}

/// An error whose message is safe to show to the caller.
///
/// # Example
///
/// ```
/// use gatehouse::errors::{AppError, ErrorKind};
///
/// let err = AppError::not_found("Invoice");
/// assert_eq!(err.kind(), &ErrorKind::NotFound);
/// assert_eq!(err.to_string(), "Invoice not found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    field_errors: Option<FieldErrors>,
}

impl AppError {
    /// Create an error of a given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: None,
        }
    }

    /// Create an error carrying its own status and code.
    pub fn custom(
        status: StatusCode,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::Custom {
                status,
                code: code.into(),
            },
            message,
        )
    }

    /// Validation failure with optional per-field detail.
    pub fn validation(message: impl Into<String>, field_errors: Option<FieldErrors>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            field_errors,
        }
    }

    /// No verified principal.
    pub fn unauthenticated() -> Self {
        Self::new(ErrorKind::Authentication, "Authentication required")
    }

    /// Principal lacks permission.
    pub fn forbidden() -> Self {
        Self::new(ErrorKind::Authorization, "Permission denied")
    }

    /// `resource` does not exist.
    pub fn not_found(resource: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found", resource))
    }

    /// Quota exhausted.
    pub fn rate_limited() -> Self {
        Self::new(ErrorKind::RateLimitExceeded, "Too many requests")
    }

    /// Uniqueness violation.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Reference to a missing related record.
    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidReference, message)
    }

    /// Replace the message, keeping kind and field errors.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The error category.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The caller-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Per-field validation detail, if any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Stable code for this error.
    pub fn code(&self) -> &str {
        self.kind.code()
    }
}

/// Unwrap a principal, failing with an authentication error when absent.
pub fn ensure_authenticated<T>(principal: Option<T>, message: Option<&str>) -> Result<T, AppError> {
    principal.ok_or_else(|| match message {
        Some(m) => AppError::unauthenticated().with_message(m),
        None => AppError::unauthenticated(),
    })
}

/// Fail with an authorization error unless `allowed`.
pub fn ensure_authorized(allowed: bool, message: Option<&str>) -> Result<(), AppError> {
    if allowed {
        return Ok(());
    }
    Err(match message {
        Some(m) => AppError::forbidden().with_message(m),
        None => AppError::forbidden(),
    })
}

/// Unwrap a looked-up value, failing with "`resource` not found" when absent.
pub fn ensure_found<T>(value: Option<T>, resource: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::not_found(resource))
}
