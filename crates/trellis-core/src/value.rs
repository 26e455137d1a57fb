//! Dynamic values flowing through parameter resolution.
//!
//! Every resolved kwarg is a [`ParamValue`]. The variants mirror the sources
//! a value can come from: primitive query/path/header strings, coerced
//! booleans, JSON payloads, form files, state snapshots, the connection
//! handles themselves, and type-erased provider products.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::connection::{HttpRequest, SocketSession};
use crate::form::UploadedFile;
use crate::state::StateSnapshot;

/// Type-erased value produced by a provider.
///
/// The inner `dyn Any` is whatever the factory returned, upcast to `Any` so
/// heterogeneous products (pools, clients, domain services) share one table.
/// Consumers downcast back with [`ParamValue::downcast_shared`].
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// The keyword-argument mapping handed to a handler invocation.
///
/// Built fresh per request, never persisted, discarded after the call.
pub type Kwargs = IndexMap<String, ParamValue>;

/// One resolved keyword-argument value.
#[derive(Clone)]
pub enum ParamValue {
    /// Absent value for an optional field with no source match.
    None,
    /// A coerced query-string boolean.
    Bool(bool),
    /// A raw string from path, query, header, or cookie sources.
    Str(String),
    /// A JSON payload (request body or JSON-encoded form field).
    Json(Value),
    /// Repeated-key promotion result, encounter order preserved.
    List(Vec<ParamValue>),
    /// An ordered name → value mapping (headers, cookies, query, form data).
    Map(IndexMap<String, ParamValue>),
    /// An uploaded file passed through untouched.
    File(UploadedFile),
    /// An immutable copy of the application state.
    State(StateSnapshot),
    /// The HTTP request itself, for `request` fields.
    Http(Arc<HttpRequest>),
    /// The socket session itself, for `socket` fields.
    Socket(Arc<SocketSession>),
    /// A type-erased provider product.
    Shared(SharedValue),
}

impl ParamValue {
    /// Wraps an arbitrary provider product as a shared value.
    pub fn shared<T: Any + Send + Sync>(value: T) -> Self {
        Self::Shared(Arc::new(value))
    }

    /// Returns `true` for the absent-value sentinel.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a coerced boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the JSON payload, if this is a JSON value.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to downcast a shared provider product to a concrete type.
    pub fn downcast_shared<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Shared(v) => Arc::clone(v).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<UploadedFile> for ParamValue {
    fn from(value: UploadedFile) -> Self {
        Self::File(value)
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::File(a), Self::File(b)) => a == b,
            (Self::State(a), Self::State(b)) => a == b,
            // Handles and shared products compare by identity.
            (Self::Http(a), Self::Http(b)) => Arc::ptr_eq(a, b),
            (Self::Socket(a), Self::Socket(b)) => Arc::ptr_eq(a, b),
            (Self::Shared(a), Self::Shared(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
            Self::State(s) => f.debug_tuple("State").field(s).finish(),
            Self::Http(_) => f.write_str("Http(..)"),
            Self::Socket(_) => f.write_str("Socket(..)"),
            Self::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}
