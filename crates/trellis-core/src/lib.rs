//! # Trellis Core
//!
//! Core types for the Trellis parameter-resolution engine.
//!
//! This crate provides the foundational building blocks the resolution
//! engine (`trellis-resolve`) operates on:
//!
//! - **Connections**: the abstract request/session boundary ([`Connection`],
//!   [`HttpRequest`], [`SocketSession`]) with once-only body caching
//! - **Field Model**: declared parameter metadata ([`FieldDescriptor`],
//!   [`FieldSet`], [`Shape`], source hints)
//! - **Dynamic Values**: the resolved kwarg representation ([`ParamValue`],
//!   [`Kwargs`])
//! - **Providers**: named async dependency factories ([`Provider`],
//!   [`Provide`]) and the validated signature-model seam ([`SignatureModel`])
//! - **Application State**: snapshot-on-read shared state ([`AppState`])
//! - **Form Decoding**: url-encoded and multipart wire payloads
//!   ([`FormData`], [`UploadedFile`])
//! - **Errors**: configuration vs. validation failure kinds ([`ConfigError`],
//!   [`ValidationError`], [`ResolveError`])
//!
//! The crate never owns a transport: connections are constructed by the
//! embedding server layer and handed in for the lifetime of one request or
//! session.

pub mod connection;
pub mod error;
pub mod field;
pub mod form;
pub mod provide;
pub mod state;
pub mod value;

pub use connection::{Connection, HttpRequest, Method, SocketSession, cookies_from_header};
pub use error::{ConfigError, ConfigResult, ResolveError, ResolveResult, ValidationError};
pub use field::{FieldDescriptor, FieldKind, FieldSet, ParamHints, RequestEncoding, Shape};
pub use form::{FormData, FormValue, UploadedFile};
pub use provide::{PlainModel, Provide, Provider, ProviderMap, SignatureModel};
pub use state::{AppState, StateSnapshot};
pub use value::{Kwargs, ParamValue, SharedValue};
