//! Terminal failure boundary for HTTP services.
//!
//! This module provides:
//! - [`Environment`]: production/development gate for diagnostic detail
//! - [`translate`]: map a downstream failure to an [`ErrorEnvelope`]
//! - [`FailureBoundaryLayer`]: Tower middleware that terminates every
//!   downstream error into exactly one JSON response
//! - [`catch_panic_response`]: panic handler producing the same envelope for
//!   use with `tower_http::catch_panic::CatchPanicLayer::custom`
//!
//! # Classification
//!
//! The immediate error's runtime type selects the response shape: validation
//! and argument failures produce 400-class bodies, framework-level
//! malformed-request failures produce 400 or 413 depending on the reported
//! message, and everything else becomes a 500-class body. The default branch
//! reports the *innermost* cause of the chain while dispatch inspects the
//! *outer* error, so a `ValidationError` wrapped inside another error type is
//! treated as unclassified.
//!
//! The boundary never re-raises: its service error type is [`Infallible`],
//! which also makes it mountable directly in an axum `Router`.

use std::backtrace::Backtrace;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use http::Request;
use pin_project_lite::pin_project;
use tower::util::Oneshot;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::envelope::ErrorEnvelope;
use crate::failure::{
    innermost_cause, ArgumentError, MalformedRequestError, ValidationError,
    BODY_TOO_LARGE_MESSAGE,
};
use crate::status;

/// Deployment environment gating diagnostic detail in error bodies.
///
/// Only production suppresses backtraces and cause chains. An unset or
/// unrecognized `APP_ENV` resolves to production so that detail is never
/// leaked by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Full diagnostic detail in unclassified failure bodies.
    Development,
    /// Production-safe bodies: code and message only.
    #[default]
    Production,
}

impl Environment {
    /// Resolve the environment from the `APP_ENV` environment variable.
    ///
    /// `production` (case-insensitive, or unset) maps to [`Environment::Production`];
    /// any other value maps to [`Environment::Development`].
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV") {
            Ok(value) if !value.trim().is_empty() && !value.eq_ignore_ascii_case("production") => {
                Environment::Development
            }
            _ => Environment::Production,
        }
    }

    /// Whether this is the production environment.
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Translate a downstream failure into an error envelope.
///
/// Logs client-attributable kinds at warn and everything else at error, then
/// builds the body for the failure kind (see the module docs for the
/// classification rules).
pub fn translate(err: &(dyn StdError + 'static), environment: Environment) -> ErrorEnvelope {
    if let Some(validation) = err.downcast_ref::<ValidationError>() {
        tracing::warn!(error = %err, "request failed validation");
        return ErrorEnvelope::invalid_input(validation.errors.clone());
    }

    if let Some(argument) = err.downcast_ref::<ArgumentError>() {
        tracing::warn!(error = %err, "invalid request argument");
        return ErrorEnvelope::argument(argument.message.clone());
    }

    if let Some(malformed) = err.downcast_ref::<MalformedRequestError>() {
        tracing::warn!(error = %err, "malformed request");
        let code = if malformed.message == BODY_TOO_LARGE_MESSAGE {
            status::PAYLOAD_TOO_LARGE
        } else {
            status::INVALID_INPUT
        };
        return ErrorEnvelope::malformed(code, malformed.message.clone());
    }

    // Unclassified: report the innermost cause, not the wrapper.
    let cause = innermost_cause(err);
    tracing::error!(error = %err, cause = %cause, "unhandled failure");

    if environment.is_production() {
        return ErrorEnvelope::internal(cause.to_string());
    }

    let outer = err.to_string();
    let source = (outer != cause.to_string()).then_some(outer);
    let stack = Backtrace::force_capture().to_string();

    // The innermost cause has no source by definition, so innerException only
    // serializes when a caller hands translate a partially unwrapped error.
    let inner_exception = cause.source().map(|e| e.to_string());

    ErrorEnvelope::internal_detailed(cause.to_string(), source, Some(stack), inner_exception)
}

/// Tower layer applying a [`FailureBoundary`] around a fallible service.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureBoundaryLayer {
    environment: Environment,
}

impl FailureBoundaryLayer {
    /// Create a layer for the given environment.
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

impl<S> Layer<S> for FailureBoundaryLayer {
    type Service = FailureBoundary<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FailureBoundary::new(inner, self.environment)
    }
}

/// Middleware that terminates downstream errors into JSON responses.
///
/// Wraps a service whose error converts into [`BoxError`]; the wrapped
/// service is infallible, so it can be mounted with axum's `route_service`
/// or `fallback_service`.
#[derive(Debug, Clone)]
pub struct FailureBoundary<S> {
    inner: S,
    environment: Environment,
}

impl<S> FailureBoundary<S> {
    /// Wrap a service in the boundary.
    pub fn new(inner: S, environment: Environment) -> Self {
        Self { inner, environment }
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for FailureBoundary<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone,
    S::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = FailureBoundaryFuture<Oneshot<S, Request<ReqBody>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is driven inside the oneshot so that a failing inner
        // poll_ready is also translated into a response.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        FailureBoundaryFuture {
            inner: inner.oneshot(req),
            environment: self.environment,
        }
    }
}

pin_project! {
    /// Future that converts a downstream error into a JSON response.
    pub struct FailureBoundaryFuture<F> {
        #[pin]
        inner: F,
        environment: Environment,
    }
}

impl<F, E> Future for FailureBoundaryFuture<F>
where
    F: Future<Output = Result<Response, E>>,
    E: Into<BoxError>,
{
    type Output = Result<Response, Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(response)) => Poll::Ready(Ok(response)),
            Poll::Ready(Err(err)) => {
                let err: BoxError = err.into();
                let err: &(dyn StdError + 'static) = err.as_ref();
                let envelope = translate(err, *this.environment);
                Poll::Ready(Ok(envelope.into_response()))
            }
        }
    }
}

/// Build a 500-class envelope response for a caught panic.
///
/// Suitable for `tower_http::catch_panic::CatchPanicLayer::custom`, extending
/// the boundary's contract to panicking handlers. The body always uses the
/// production-safe shape.
pub fn catch_panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unhandled panic".to_string()
    };

    tracing::error!(message = %message, "panic reached the failure boundary");

    ErrorEnvelope::internal(message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::FieldError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("wrapper")]
    struct Wrapper {
        #[source]
        cause: Box<dyn StdError + Send + Sync>,
    }

    #[test]
    fn test_translate_validation() {
        let err = ValidationError::new(vec![FieldError::new("name", "required")]);
        let envelope = translate(&err, Environment::Development);

        assert_eq!(envelope.code, status::INVALID_INPUT);
        assert_eq!(
            envelope.errors.as_deref(),
            Some(&[FieldError::new("name", "required")][..])
        );
        assert!(envelope.message.is_none());
        assert!(envelope.stack.is_none());
    }

    #[test]
    fn test_translate_argument() {
        let err = ArgumentError::new("missing `from`");
        let envelope = translate(&err, Environment::Production);

        assert_eq!(envelope.code, status::INVALID_INPUT);
        assert_eq!(envelope.message.as_deref(), Some("missing `from`"));
        assert!(envelope.errors.is_none());
    }

    #[test]
    fn test_translate_body_too_large() {
        let err = MalformedRequestError::body_too_large();
        let envelope = translate(&err, Environment::Production);

        assert_eq!(envelope.code, status::PAYLOAD_TOO_LARGE);
        assert_eq!(envelope.message.as_deref(), Some(BODY_TOO_LARGE_MESSAGE));
    }

    #[test]
    fn test_translate_malformed_other_message() {
        let err = MalformedRequestError::new("Unexpected end of request content.");
        let envelope = translate(&err, Environment::Production);

        assert_eq!(envelope.code, status::INVALID_INPUT);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Unexpected end of request content.")
        );
    }

    #[test]
    fn test_translate_unclassified_development() {
        let err = Wrapper {
            cause: Box::new(ArgumentError::new("boom")),
        };
        let envelope = translate(&err, Environment::Development);

        assert_eq!(envelope.code, status::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message.as_deref(), Some("boom"));
        assert_eq!(envelope.source.as_deref(), Some("wrapper"));
        assert!(envelope.stack.is_some());
    }

    #[test]
    fn test_translate_unclassified_production() {
        let err = Wrapper {
            cause: Box::new(ArgumentError::new("boom")),
        };
        let envelope = translate(&err, Environment::Production);

        assert_eq!(envelope.code, status::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message.as_deref(), Some("boom"));
        assert!(envelope.source.is_none());
        assert!(envelope.stack.is_none());
        assert!(envelope.inner_exception.is_none());
    }

    #[test]
    fn test_translate_wrapped_validation_is_unclassified() {
        // Dispatch inspects the outer error's type, so a wrapped validation
        // failure lands in the default branch.
        let err = Wrapper {
            cause: Box::new(ValidationError::single("name", "required")),
        };
        let envelope = translate(&err, Environment::Production);

        assert_eq!(envelope.code, status::INTERNAL_SERVER_ERROR);
        assert!(envelope.errors.is_none());
    }

    #[test]
    fn test_environment_default_is_production() {
        assert!(Environment::default().is_production());
        assert!(!Environment::Development.is_production());
    }

    #[test]
    fn test_catch_panic_response_str_payload() {
        let response = catch_panic_response(Box::new("worker died"));
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
