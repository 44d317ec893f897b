//! Request-level error taxonomy and its translation into responses.
//!
//! Handlers raise [`AppError`], [`ValidationErrors`] or [`PersistenceError`]
//! (or anything else) close to where a problem is detected and propagate it
//! unmodified. The [`ErrorClassifier`] at the governance boundary turns it
//! into a [`ClassifiedError`].

mod app;
mod classify;
mod persistence;
mod validation;

pub use app::{
    ensure_authenticated, ensure_authorized, ensure_found, AppError, ErrorKind, FieldErrors,
};
pub use classify::{ClassifiedError, ErrorClassifier, GENERIC_ERROR_MESSAGE};
pub use persistence::{ConstraintKind, PersistenceError};
pub use validation::{FieldViolation, ValidationErrors};
