//! Failure taxonomy understood by the failure boundary.
//!
//! Three concrete error types cover the client-attributable failure kinds:
//!
//! - [`ValidationError`]: structured field-level validation errors
//! - [`ArgumentError`]: a malformed or missing request argument
//! - [`MalformedRequestError`]: a request rejected by the framework layer
//!
//! Anything else that reaches the boundary is treated as an unclassified
//! server-side failure. [`innermost_cause`] walks an error's `source()` chain
//! to the underlying cause reported in diagnostic bodies.

use thiserror::Error;

use crate::envelope::FieldError;

/// Message the framework layer attaches when a request body exceeds the
/// configured limit. Matched verbatim to classify the failure as 413.
pub const BODY_TOO_LARGE_MESSAGE: &str = "Request body too large.";

/// Request input failed validation.
#[derive(Debug, Clone, Error)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationError {
    /// Field-level errors, in the order they were recorded.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Create a validation error from collected field errors.
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Create a validation error for a single field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A request argument was malformed or missing.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ArgumentError {
    /// Description of the bad argument.
    pub message: String,
}

impl ArgumentError {
    /// Create an argument error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The framework layer rejected the request before it reached a handler.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MalformedRequestError {
    /// Message reported by the framework layer.
    pub message: String,
}

impl MalformedRequestError {
    /// Create a malformed-request error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The canonical body-size rejection, translated to a 413 envelope.
    pub fn body_too_large() -> Self {
        Self::new(BODY_TOO_LARGE_MESSAGE)
    }
}

/// Follow an error's `source()` chain to its end.
///
/// Returns the error itself when it has no cause.
pub fn innermost_cause<'a>(
    err: &'a (dyn std::error::Error + 'static),
) -> &'a (dyn std::error::Error + 'static) {
    let mut current = err;
    while let Some(cause) = current.source() {
        current = cause;
    }
    current
}
