//! Composable binding of repeated query/path values into collections.
//!
//! This module provides:
//! - [`ParameterMeta`]: metadata describing a bindable parameter
//! - [`ElementBinder`] / [`BinderProvider`]: the element-binding seam
//! - [`CollectionBinderProvider`]: composes sibling providers into a
//!   [`CollectionBinder`] for enumerable query/path parameters
//! - [`ScalarBinder`] / [`TextBinder`]: built-in element binders
//! - [`query_values`]: collect the repeated raw values for one query key
//!
//! The provider holds an explicit ordered registry of the *other* binder
//! providers (itself excluded, so composition never re-enters). It declines
//! parameters that are not enumerable or whose values cannot come from a path
//! segment or query string, leaving those to other providers. This layer is
//! pure composition: element binders report their own errors, which surface
//! unmodified.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Where a parameter's raw values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// A path segment.
    Path,
    /// A query-string key.
    Query,
    /// A request header.
    Header,
    /// The request body.
    Body,
}

impl BindingSource {
    /// Whether per-element values can be taken from this source.
    pub fn accepts_values(self) -> bool {
        matches!(self, BindingSource::Path | BindingSource::Query)
    }
}

/// Metadata for a bindable request parameter.
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    /// Parameter name as it appears in the request.
    pub name: String,
    /// Whether the declared target type is a collection.
    pub enumerable: bool,
    /// Declared binding source, when one is known.
    pub source: Option<BindingSource>,
}

impl ParameterMeta {
    /// Metadata for an enumerable query parameter.
    pub fn query(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enumerable: true,
            source: Some(BindingSource::Query),
        }
    }

    /// Metadata for an enumerable path parameter.
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enumerable: true,
            source: Some(BindingSource::Path),
        }
    }

    /// Override the enumerable flag.
    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    /// Override the binding source.
    pub fn with_source(mut self, source: Option<BindingSource>) -> Self {
        self.source = source;
        self
    }
}

/// Error raised while binding an element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// An element binder rejected a value it claimed.
    #[error("value `{value}` for parameter `{parameter}` is invalid: {reason}")]
    Invalid {
        /// Parameter being bound.
        parameter: String,
        /// Offending raw value.
        value: String,
        /// Why the binder rejected it.
        reason: String,
    },

    /// No registered element binder accepted the value.
    #[error("no element binder accepted value `{value}` for parameter `{parameter}`")]
    Unbound {
        /// Parameter being bound.
        parameter: String,
        /// Raw value nothing accepted.
        value: String,
    },
}

/// Binds one raw inbound value to one element.
///
/// `Ok(None)` means the binder declines the value and the next registered
/// binder is consulted; `Err` aborts the bind and surfaces unmodified.
pub trait ElementBinder: Send + Sync {
    /// Bind a single raw value.
    fn bind(&self, meta: &ParameterMeta, raw: &str) -> Result<Option<Value>, BindError>;
}

/// Supplies an element binder for a parameter, or declines.
pub trait BinderProvider: Send + Sync {
    /// Return a binder for the parameter, or `None` to let other providers
    /// try.
    fn binder(&self, meta: &ParameterMeta) -> Option<Box<dyn ElementBinder>>;
}

/// Composes sibling binder providers into collection binders.
///
/// Construct with the registry of other providers, in registration order and
/// excluding the composite itself.
pub struct CollectionBinderProvider {
    providers: Vec<Arc<dyn BinderProvider>>,
}

impl CollectionBinderProvider {
    /// Create a provider over an explicit registry of element providers.
    pub fn new(providers: Vec<Arc<dyn BinderProvider>>) -> Self {
        Self { providers }
    }

    /// Produce a collection binder for the parameter, or decline.
    ///
    /// Declines unless the parameter is enumerable and its source can accept
    /// values from a path segment or query string. When applicable, every
    /// registered provider is asked for an element binder and the non-`None`
    /// results are composed in registration order.
    pub fn binder(&self, meta: &ParameterMeta) -> Option<CollectionBinder> {
        if !meta.enumerable {
            return None;
        }
        if !meta.source.is_some_and(BindingSource::accepts_values) {
            return None;
        }

        let binders = self
            .providers
            .iter()
            .filter_map(|provider| provider.binder(meta))
            .collect();

        Some(CollectionBinder {
            meta: meta.clone(),
            binders,
        })
    }
}

/// Binds repeated raw values into a collection by delegating per element.
pub struct CollectionBinder {
    meta: ParameterMeta,
    binders: Vec<Box<dyn ElementBinder>>,
}

impl CollectionBinder {
    /// Bind each raw value through the composed element binders.
    ///
    /// Values bind in order; for each one the element binders are consulted
    /// in registration order and the first non-declining result supplies the
    /// element. A binder error aborts the bind unmodified; a value no binder
    /// accepts is [`BindError::Unbound`].
    pub fn bind(&self, values: &[String]) -> Result<Vec<Value>, BindError> {
        let mut bound = Vec::with_capacity(values.len());

        'values: for value in values {
            for binder in &self.binders {
                if let Some(element) = binder.bind(&self.meta, value)? {
                    bound.push(element);
                    continue 'values;
                }
            }
            return Err(BindError::Unbound {
                parameter: self.meta.name.clone(),
                value: value.clone(),
            });
        }

        Ok(bound)
    }
}

/// Binds boolean and numeric literals, declining everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBinder;

impl ElementBinder for ScalarBinder {
    fn bind(&self, _meta: &ParameterMeta, raw: &str) -> Result<Option<Value>, BindError> {
        if let Ok(flag) = raw.parse::<bool>() {
            return Ok(Some(Value::Bool(flag)));
        }
        if let Ok(integer) = raw.parse::<i64>() {
            return Ok(Some(Value::from(integer)));
        }
        if let Ok(float) = raw.parse::<f64>() {
            // NaN and infinities have no JSON representation.
            return Ok(serde_json::Number::from_f64(float).map(Value::Number));
        }
        Ok(None)
    }
}

impl BinderProvider for ScalarBinder {
    fn binder(&self, _meta: &ParameterMeta) -> Option<Box<dyn ElementBinder>> {
        Some(Box::new(*self))
    }
}

/// Binds any value as a string. Register last as the catch-all.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextBinder;

impl ElementBinder for TextBinder {
    fn bind(&self, _meta: &ParameterMeta, raw: &str) -> Result<Option<Value>, BindError> {
        Ok(Some(Value::String(raw.to_string())))
    }
}

impl BinderProvider for TextBinder {
    fn binder(&self, _meta: &ParameterMeta) -> Option<Box<dyn ElementBinder>> {
        Some(Box::new(*self))
    }
}

/// Collect the repeated raw values for `key` from a query string, in order.
///
/// Handles `+` and percent-encoded bytes in values; pairs without `=` yield
/// an empty value.
pub fn query_values(query: &str, key: &str) -> Vec<String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then(|| percent_decode(v))
        })
        .collect()
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => match hex_pair(&bytes[i + 1..i + 3]) {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(b'%');
                    i += 1;
                }
            },
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let high = (pair[0] as char).to_digit(16)?;
    let low = (pair[1] as char).to_digit(16)?;
    Some((high * 16 + low) as u8)
}
