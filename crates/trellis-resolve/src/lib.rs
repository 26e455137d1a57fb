//! # Trellis Resolve
//!
//! The parameter-resolution and dependency-injection engine for Trellis
//! handlers.
//!
//! Given a connection (HTTP request or persistent socket session) and a
//! handler's declared signature, this crate produces the exact keyword
//! arguments the handler needs:
//!
//! - **Query parsing**: raw query strings become ordered mappings with
//!   list promotion and boolean coercion ([`parse_query`])
//! - **Body decoding**: JSON and form bodies, shaped by the declared field
//!   ([`request_data`])
//! - **Parameter extraction**: path/query/header/cookie precedence with
//!   declared aliases and defaults ([`connection_param`])
//! - **Kwargs building**: reserved-name dispatch plus extraction for one
//!   whole field set ([`connection_kwargs`], [`ReservedField`])
//! - **Dependency resolution**: recursive, cycle-guarded provider graphs
//!   ([`resolve_signature`])
//!
//! ```text
//! ┌────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ Connection │────▶│   Resolver   │────▶│ handler(**kwargs) │
//! │ (http/ws)  │     │  + providers │     └───────────────────┘
//! └────────────┘     └──────────────┘
//! ```
//!
//! Errors are never handled here: configuration mistakes and client
//! validation failures propagate to the request-handling layer, which owns
//! response policy.

pub mod body;
pub mod kwargs;
pub mod params;
pub mod query;
pub mod resolver;

pub use body::request_data;
pub use kwargs::{ReservedField, connection_kwargs};
pub use params::connection_param;
pub use query::parse_query;
pub use resolver::resolve_signature;
