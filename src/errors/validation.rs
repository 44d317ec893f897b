//! Structured schema violations.

use std::fmt;

use super::app::FieldErrors;

/// One violated rule, located by a path into the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Path segments from the root of the input; empty for form-level errors
    pub path: Vec<String>,
    /// What is wrong
    pub message: String,
}

impl FieldViolation {
    /// Violation of a top-level field.
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
            message: message.into(),
        }
    }

    /// Violation at a nested path.
    pub fn at<I, S>(path: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Violation of the input as a whole.
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }
}

/// Every violation found while validating one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    /// Caller-facing message for any validation failure.
    pub const MESSAGE: &'static str = "Validation failed";

    /// No violations yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one violation.
    pub fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    /// Add every message in `messages` against a top-level field.
    pub fn extend_field<I, S>(&mut self, field: &str, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for message in messages {
            self.push(FieldViolation::field(field, message));
        }
    }

    /// Whether anything was violated.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations in the order they were found.
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Messages grouped by the first path segment. Form-level violations are left out.
    pub fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for violation in &self.violations {
            if let Some(field) = violation.path.first() {
                errors
                    .entry(field.clone())
                    .or_default()
                    .push(violation.message.clone());
            }
        }
        errors
    }

    /// Messages of violations that concern the input as a whole.
    pub fn form_errors(&self) -> Vec<String> {
        self.violations
            .iter()
            .filter(|v| v.path.is_empty())
            .map(|v| v.message.clone())
            .collect()
    }

    /// `Ok` when nothing was violated.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::MESSAGE)?;
        for (i, violation) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            if violation.path.is_empty() {
                write!(f, "{}{}", sep, violation.message)?;
            } else {
                write!(f, "{}{}: {}", sep, violation.path.join("."), violation.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
