//! Correlation id capture and outbound propagation.
//!
//! This module provides:
//! - [`RequestId`]: Newtype for correlation ids
//! - [`RequestIdConfig`]: Output header name plus the ordered list of inbound
//!   header names consulted as sources
//! - [`RequestContext`]: Explicit per-request context (inbound header
//!   snapshot plus an ambient id) carried through the call chain
//! - [`RequestContextLayer`]: Inbound middleware that captures the context
//!   into request extensions
//! - [`PropagateRequestIdLayer`]: Outbound client middleware that writes the
//!   resolved id onto the request and binds it as a tracing field
//!
//! # Resolution order
//!
//! For each outbound call the id is taken from the first configured inbound
//! header with a non-blank value; when no header matches (or no inbound
//! request exists, as in a background job) the ambient context id is used.
//! A blank result suppresses propagation entirely: no header is written and
//! no tracing field is bound.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::FromRequestParts;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Request};
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::{info_span, Span};
use uuid::Uuid;

/// Header used by default both as propagation target and inbound source.
pub const DEFAULT_HEADER_NAME: HeaderName = HeaderName::from_static("x-request-id");

/// Newtype wrapper for request correlation ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Create a request ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh UUID v7 (time-sortable) request ID.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Configuration for correlation id propagation.
#[derive(Debug, Clone)]
pub struct RequestIdConfig {
    header_name: HeaderName,
    inbound_headers: Vec<HeaderName>,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_HEADER_NAME,
            inbound_headers: vec![DEFAULT_HEADER_NAME],
        }
    }
}

impl RequestIdConfig {
    /// Use `header_name` both as the outbound header and the single inbound
    /// source.
    pub fn new(header_name: HeaderName) -> Self {
        let inbound_headers = vec![header_name.clone()];
        Self {
            header_name,
            inbound_headers,
        }
    }

    /// Use `header_name` outbound while consulting `inbound_headers` in order
    /// as sources. An empty source list falls back to the outbound name.
    pub fn with_sources(header_name: HeaderName, inbound_headers: Vec<HeaderName>) -> Self {
        if inbound_headers.is_empty() {
            return Self::new(header_name);
        }
        Self {
            header_name,
            inbound_headers,
        }
    }

    /// The outbound header written by the propagator.
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// The ordered inbound header names consulted as sources.
    pub fn inbound_headers(&self) -> &[HeaderName] {
        &self.inbound_headers
    }
}

/// Explicit per-request context consulted by the propagator.
///
/// Carries a snapshot of the inbound request headers (absent for background
/// work with no inbound request) and the ambient correlation id established
/// when the request entered the service.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    inbound_headers: Option<HeaderMap>,
    ambient_id: Option<RequestId>,
}

impl RequestContext {
    /// Context for an inbound HTTP request.
    pub fn new(inbound_headers: HeaderMap, ambient_id: Option<RequestId>) -> Self {
        Self {
            inbound_headers: Some(inbound_headers),
            ambient_id,
        }
    }

    /// Context for background work with no inbound request.
    pub fn background(ambient_id: RequestId) -> Self {
        Self {
            inbound_headers: None,
            ambient_id: Some(ambient_id),
        }
    }

    /// Context built from inbound headers alone, with the ambient id
    /// extracted or generated via [`extract_or_generate_request_id`].
    pub fn from_headers(headers: HeaderMap, config: &RequestIdConfig) -> Self {
        let ambient = extract_or_generate_request_id(&headers, config);
        Self::new(headers, Some(ambient))
    }

    /// The ambient correlation id, if one is set.
    pub fn ambient_id(&self) -> Option<&RequestId> {
        self.ambient_id.as_ref()
    }
}

/// Extract the ambient request ID from headers or generate a new UUID v7.
///
/// Consults the configured inbound header names in order and takes the first
/// non-blank value; generates a fresh id when none matches.
pub fn extract_or_generate_request_id(headers: &HeaderMap, config: &RequestIdConfig) -> RequestId {
    config
        .inbound_headers()
        .iter()
        .find_map(|name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|s| !s.trim().is_empty())
        })
        .map(RequestId::from)
        .unwrap_or_else(RequestId::generate)
}

/// Resolve the correlation id to propagate for one outbound call.
///
/// The first configured inbound header with a non-blank value wins; otherwise
/// the ambient id is used. Returns `None` when the result is blank, in which
/// case nothing is propagated.
pub fn resolve_request_id(config: &RequestIdConfig, ctx: &RequestContext) -> Option<RequestId> {
    let mut resolved = ctx.ambient_id.clone();

    if let Some(headers) = &ctx.inbound_headers {
        for name in config.inbound_headers() {
            let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            resolved = Some(RequestId::new(value));
            break;
        }
    }

    resolved.filter(|id| !id.is_blank())
}

/// Missing extensions fall back to a context built from the request headers.
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| {
                RequestContext::from_headers(parts.headers.clone(), &RequestIdConfig::default())
            }))
    }
}

// =============================================================================
// RequestContextLayer - inbound context capture
// =============================================================================

/// Tower layer capturing a [`RequestContext`] for each inbound request.
///
/// Snapshots the inbound headers, extracts or generates the ambient id, and
/// stores the context in request extensions where handlers (and the outbound
/// propagator) can reach it. The handler runs inside a tracing span carrying
/// the ambient id.
#[derive(Debug, Clone, Default)]
pub struct RequestContextLayer {
    config: RequestIdConfig,
}

impl RequestContextLayer {
    /// Create a layer with the given configuration.
    pub fn new(config: RequestIdConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Middleware service that captures the request context.
#[derive(Debug, Clone)]
pub struct RequestContextMiddleware<S> {
    inner: S,
    config: RequestIdConfig,
}

impl<S, ReqBody> Service<Request<ReqBody>> for RequestContextMiddleware<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ScopedSpanFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let ambient = extract_or_generate_request_id(req.headers(), &self.config);
        let ctx = RequestContext::new(req.headers().clone(), Some(ambient.clone()));
        req.extensions_mut().insert(ctx);

        let span = info_span!("request", request_id = %ambient);

        ScopedSpanFuture {
            inner: self.inner.call(req),
            span,
        }
    }
}

// =============================================================================
// PropagateRequestIdLayer - outbound propagation
// =============================================================================

/// Tower layer for outbound client stacks that propagates the correlation id.
///
/// For each outbound request the id is resolved from the request's
/// [`RequestContext`] extension (attach one with
/// `request.extensions_mut().insert(ctx)` before sending). A resolved id
/// replaces any existing value under the configured outbound header and is
/// bound as a `request_id` tracing field for the duration of the call; a
/// blank or missing id leaves the request untouched. Best-effort by design:
/// this layer introduces no error conditions of its own.
#[derive(Debug, Clone, Default)]
pub struct PropagateRequestIdLayer {
    config: RequestIdConfig,
}

impl PropagateRequestIdLayer {
    /// Create a layer with the given configuration.
    pub fn new(config: RequestIdConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for PropagateRequestIdLayer {
    type Service = PropagateRequestId<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PropagateRequestId {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Middleware service that writes the resolved correlation id outbound.
#[derive(Debug, Clone)]
pub struct PropagateRequestId<S> {
    inner: S,
    config: RequestIdConfig,
}

impl<S, ReqBody> Service<Request<ReqBody>> for PropagateRequestId<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ScopedSpanFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let ctx = req
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();

        let span = match resolve_request_id(&self.config, &ctx) {
            Some(id) => match HeaderValue::from_str(id.as_str()) {
                Ok(value) => {
                    // Insert replaces every existing value: a stale id must
                    // not survive, and never as a duplicate.
                    req.headers_mut().insert(self.config.header_name().clone(), value);
                    info_span!("outbound_request", request_id = %id)
                }
                // An id the header encoding cannot carry is not propagated;
                // the request is left untouched.
                Err(_) => Span::none(),
            },
            None => Span::none(),
        };

        ScopedSpanFuture {
            inner: self.inner.call(req),
            span,
        }
    }
}

pin_project! {
    /// Future that keeps a tracing span entered while the call is polled.
    ///
    /// Holding the span in the future scopes the `request_id` field to the
    /// logical call: it is released on completion, failure, or drop, so
    /// concurrent calls never leak each other's id into unrelated log lines.
    pub struct ScopedSpanFuture<F> {
        #[pin]
        inner: F,
        span: Span,
    }
}

impl<F: Future> Future for ScopedSpanFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_request_id_generate_is_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_resolve_prefers_inbound_header() {
        let config = RequestIdConfig::default();
        let ctx = RequestContext::new(
            headers(&[("x-request-id", "inbound-1")]),
            Some(RequestId::new("ambient-1")),
        );

        let id = resolve_request_id(&config, &ctx).unwrap();
        assert_eq!(id.as_str(), "inbound-1");
    }

    #[test]
    fn test_resolve_scans_sources_in_order() {
        let config = RequestIdConfig::with_sources(
            DEFAULT_HEADER_NAME,
            vec![
                HeaderName::from_static("x-correlation-id"),
                HeaderName::from_static("x-request-id"),
            ],
        );
        let ctx = RequestContext::new(
            headers(&[
                ("x-request-id", "second-choice"),
                ("x-correlation-id", "first-choice"),
            ]),
            None,
        );

        let id = resolve_request_id(&config, &ctx).unwrap();
        assert_eq!(id.as_str(), "first-choice");
    }

    #[test]
    fn test_resolve_skips_blank_header_value() {
        let config = RequestIdConfig::default();
        let ctx = RequestContext::new(
            headers(&[("x-request-id", "   ")]),
            Some(RequestId::new("ambient-2")),
        );

        let id = resolve_request_id(&config, &ctx).unwrap();
        assert_eq!(id.as_str(), "ambient-2");
    }

    #[test]
    fn test_resolve_background_uses_ambient_only() {
        let config = RequestIdConfig::default();
        let ctx = RequestContext::background(RequestId::new("job-7"));

        let id = resolve_request_id(&config, &ctx).unwrap();
        assert_eq!(id.as_str(), "job-7");
    }

    #[test]
    fn test_resolve_blank_everywhere_is_none() {
        let config = RequestIdConfig::default();

        assert!(resolve_request_id(&config, &RequestContext::default()).is_none());

        let blank_ambient = RequestContext::new(HeaderMap::new(), Some(RequestId::new("  ")));
        assert!(resolve_request_id(&config, &blank_ambient).is_none());
    }

    #[test]
    fn test_extract_or_generate_falls_back_to_uuid() {
        let config = RequestIdConfig::default();
        let id = extract_or_generate_request_id(&HeaderMap::new(), &config);

        assert_eq!(id.as_str().len(), 36);
        assert!(id.as_str().contains('-'));
    }

    #[test]
    fn test_extract_prefers_header() {
        let config = RequestIdConfig::default();
        let id =
            extract_or_generate_request_id(&headers(&[("x-request-id", "req-9")]), &config);

        assert_eq!(id.as_str(), "req-9");
    }

    #[test]
    fn test_config_empty_sources_fall_back_to_output_name() {
        let config = RequestIdConfig::with_sources(DEFAULT_HEADER_NAME, vec![]);
        assert_eq!(config.inbound_headers().len(), 1);
        assert_eq!(config.inbound_headers()[0], DEFAULT_HEADER_NAME);
    }
}
