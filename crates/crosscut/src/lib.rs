//! Cross-cutting request infrastructure for axum microservices.
//!
//! This crate provides three independent adapters that services register in
//! their HTTP pipelines:
//!
//! - [`request_id`]: capture a correlation id inbound and propagate it on
//!   outbound client calls, bound as a tracing field for the call's lifetime
//! - [`boundary`]: a terminal failure boundary translating every downstream
//!   error into a structured JSON response with an HTTP status decoded from a
//!   6-digit business status code
//! - [`binding`]: composable binding of repeated query/path values into
//!   collections via an explicit registry of element binders
//!
//! The adapters share no runtime state and can be adopted independently.
//!
//! # Architecture
//!
//! ```text
//! inbound  ─► RequestContextLayer ─► FailureBoundary ─► handlers
//!                                                          │
//! outbound ◄─ PropagateRequestIdLayer ◄─ client stack ◄────┘
//! ```
//!
//! Both middleware pairs are plain Tower layers; the boundary's service error
//! is `Infallible`, so it mounts directly in an axum `Router`.

#![deny(warnings)]

pub mod binding;
pub mod boundary;
mod envelope;
mod failure;
pub mod logging;
pub mod request_id;
pub mod status;

pub use binding::{
    query_values, BindError, BinderProvider, BindingSource, CollectionBinder,
    CollectionBinderProvider, ElementBinder, ParameterMeta, ScalarBinder, TextBinder,
};
pub use boundary::{
    catch_panic_response, translate, Environment, FailureBoundary, FailureBoundaryLayer,
};
pub use envelope::{ErrorEnvelope, FieldError};
pub use failure::{
    innermost_cause, ArgumentError, MalformedRequestError, ValidationError,
    BODY_TOO_LARGE_MESSAGE,
};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use request_id::{
    extract_or_generate_request_id, resolve_request_id, PropagateRequestIdLayer, RequestContext,
    RequestContextLayer, RequestId, RequestIdConfig, DEFAULT_HEADER_NAME,
};
pub use status::decode_http_status;
