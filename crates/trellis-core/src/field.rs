//! Declared parameter metadata for handlers and providers.
//!
//! A [`FieldDescriptor`] carries everything resolution needs to know about
//! one declared parameter: its cardinality, whether it is an upload
//! passthrough, its default, and the declaration-time source hints. A
//! [`FieldSet`] is the ordered collection of descriptors for one signature,
//! built once at registration time and read-only thereafter.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::ParamValue;

/// Cardinality expectation for a field's resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    /// A single value.
    #[default]
    Singleton,
    /// A sequence of values.
    List,
}

/// What kind of value the field expects, as far as resolution cares.
///
/// Full type coercion is the signature model's responsibility; resolution
/// only distinguishes uploaded-file passthrough from plain data values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldKind {
    /// A plain data value, validated downstream.
    #[default]
    Value,
    /// An uploaded file handed through untouched.
    Upload,
}

/// Declared body encoding for a `data` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEncoding {
    /// `application/json` (the default when no media type is declared).
    #[serde(rename = "application/json")]
    Json,
    /// `application/x-www-form-urlencoded`.
    #[serde(rename = "application/x-www-form-urlencoded")]
    UrlEncoded,
    /// `multipart/form-data`.
    #[serde(rename = "multipart/form-data")]
    Multipart,
}

impl RequestEncoding {
    /// The wire media type this encoding corresponds to.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
        }
    }
}

/// Declaration-time source hints for one field.
///
/// An alias selects an alternate parameter source; an empty alias string
/// counts as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamHints {
    query: Option<String>,
    header: Option<String>,
    cookie: Option<String>,
    required: bool,
    media_type: Option<RequestEncoding>,
}

impl ParamHints {
    /// The declared query-parameter alias, if any.
    pub fn query_alias(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The declared header alias, if any.
    pub fn header_alias(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// The declared cookie alias, if any.
    pub fn cookie_alias(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Whether the field was declared required.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The declared body encoding, if any.
    pub fn media_type(&self) -> Option<RequestEncoding> {
        self.media_type
    }
}

/// Declared metadata for one handler or provider parameter.
///
/// Immutable once built; owned by the signature model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptor {
    shape: Shape,
    kind: FieldKind,
    default: Option<ParamValue>,
    hints: ParamHints,
}

impl FieldDescriptor {
    /// Creates a singleton value field with no default and no hints.
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Sets the cardinality expectation.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Marks the field as an uploaded-file passthrough.
    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the default used when no source matches.
    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Declares a query-parameter alias.
    pub fn with_query_alias(mut self, alias: impl Into<String>) -> Self {
        self.hints.query = Some(alias.into());
        self
    }

    /// Declares a header alias.
    pub fn with_header_alias(mut self, alias: impl Into<String>) -> Self {
        self.hints.header = Some(alias.into());
        self
    }

    /// Declares a cookie alias.
    pub fn with_cookie_alias(mut self, alias: impl Into<String>) -> Self {
        self.hints.cookie = Some(alias.into());
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.hints.required = true;
        self
    }

    /// Declares the body encoding for a `data` field.
    pub fn with_media_type(mut self, encoding: RequestEncoding) -> Self {
        self.hints.media_type = Some(encoding);
        self
    }

    /// The cardinality expectation.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The value kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The declared default, if any.
    pub fn default(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }

    /// The declaration-time source hints.
    pub fn hints(&self) -> &ParamHints {
        &self.hints
    }
}

/// The ordered field collection for one handler or provider signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: IndexMap<String, FieldDescriptor>,
}

impl FieldSet {
    /// Creates an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field (builder pattern). Declaration order is preserved.
    pub fn with(mut self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Adds a field in place.
    pub fn insert(&mut self, name: impl Into<String>, field: FieldDescriptor) {
        self.fields.insert(name.into(), field);
    }

    /// Returns the descriptor declared under the given name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Returns `true` if a field with the given name is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter()
    }

    /// Iterates field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Returns the number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldDescriptor)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (String, FieldDescriptor)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
