//! JSON error envelope returned by the failure boundary.
//!
//! Provides the wire contract for translated failures: a `code` field carrying
//! the 6-digit business status code plus kind-specific optional fields.
//! Property names are camelCase and null-valued fields are omitted, so each
//! failure kind produces exactly the keys it populates.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::status;

/// A single field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Structured error body written by the failure boundary.
///
/// `code` is always present; the remaining fields depend on the failure kind
/// (see [`crate::boundary::translate`]). Serializes compactly with camelCase
/// keys and without null-valued fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// 6-digit business status code (see [`crate::status`]).
    pub code: String,

    /// Field-level validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,

    /// Human-readable failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Where the failure surfaced, when it differs from the reported cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Captured backtrace. Only populated outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Rendered cause of the reported failure, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<String>,
}

impl ErrorEnvelope {
    /// Create an envelope carrying only a business status code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            errors: None,
            message: None,
            source: None,
            stack: None,
            inner_exception: None,
        }
    }

    /// Envelope for a validation failure: code plus field errors.
    pub fn invalid_input(errors: Vec<FieldError>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(status::INVALID_INPUT)
        }
    }

    /// Envelope for a bad request argument: code plus message.
    pub fn argument(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(status::INVALID_INPUT)
        }
    }

    /// Envelope for a malformed request rejected by the framework layer.
    pub fn malformed(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(code)
        }
    }

    /// Envelope for an unclassified failure with the production-safe shape.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(status::INTERNAL_SERVER_ERROR)
        }
    }

    /// Envelope for an unclassified failure with full diagnostic detail.
    pub fn internal_detailed(
        message: impl Into<String>,
        source: Option<String>,
        stack: Option<String>,
        inner_exception: Option<String>,
    ) -> Self {
        Self {
            message: Some(message.into()),
            source,
            stack,
            inner_exception,
            ..Self::new(status::INTERNAL_SERVER_ERROR)
        }
    }

    /// HTTP status decoded from this envelope's business code.
    pub fn http_status(&self) -> StatusCode {
        status::decode_http_status(Some(&self.code))
    }
}

/// Implement IntoResponse for axum to write the envelope as an HTTP response.
impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status = self.http_status();

        // Json writes compact output with content-type application/json.
        let mut response = Json(&self).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_code_only() {
        let envelope = ErrorEnvelope::new(status::INVALID_INPUT);
        let json = serde_json::to_string(&envelope).unwrap();

        assert_eq!(json, r#"{"code":"400000"}"#);
    }

    #[test]
    fn test_envelope_validation_shape() {
        let envelope =
            ErrorEnvelope::invalid_input(vec![FieldError::new("name", "required")]);
        let json = serde_json::to_string(&envelope).unwrap();

        assert_eq!(
            json,
            r#"{"code":"400000","errors":[{"field":"name","message":"required"}]}"#
        );
    }

    #[test]
    fn test_envelope_argument_shape() {
        let envelope = ErrorEnvelope::argument("missing `from` parameter");
        let json = serde_json::to_string(&envelope).unwrap();

        assert_eq!(
            json,
            r#"{"code":"400000","message":"missing `from` parameter"}"#
        );
    }

    #[test]
    fn test_envelope_camel_case_keys() {
        let envelope = ErrorEnvelope::internal_detailed(
            "boom",
            Some("handler".to_string()),
            Some("stack".to_string()),
            Some("inner".to_string()),
        );
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(json.contains("\"innerException\":\"inner\""));
        assert!(json.contains("\"stack\":\"stack\""));
        assert!(json.contains("\"source\":\"handler\""));
    }

    #[test]
    fn test_envelope_http_status() {
        assert_eq!(
            ErrorEnvelope::new(status::PAYLOAD_TOO_LARGE).http_status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ErrorEnvelope::new("nonsense").http_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_envelope_deserialization_round_trip() {
        let json = r#"{"code":"500000","message":"boom","stack":"trace"}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(json).unwrap();

        assert_eq!(envelope.code, status::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message.as_deref(), Some("boom"));
        assert_eq!(envelope.stack.as_deref(), Some("trace"));
        assert!(envelope.errors.is_none());
    }
}
