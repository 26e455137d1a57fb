//! Request and session connection types.
//!
//! A [`Connection`] is the abstract boundary around one client interaction.
//! Two variants exist: [`HttpRequest`] (has a method and a readable body)
//! and [`SocketSession`] (persistent, bodyless). The transport layer owns
//! construction and keeps the connection alive for the duration of the
//! request or session; resolution only reads it.
//!
//! The parsed body is cached on the request with a write-at-most-once cell,
//! so several `data`-consuming fields within one request share a single
//! parse and concurrent resolution cannot race the slot.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::{ConfigError, ConfigResult, ValidationError};
use crate::form::{self, FormData};
use crate::state::AppState;
use crate::value::ParamValue;

/// HTTP request methods understood by the resolution core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// The wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a raw `Cookie:` header line into a name → value mapping.
///
/// Transports use this to populate the cookie map before resolution runs.
pub fn cookies_from_header(header: &str) -> IndexMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

// =============================================================================
// HttpRequest
// =============================================================================

/// One client HTTP request, as handed over by the transport layer.
///
/// Header names are stored lowercase. The `user` and `auth` slots are
/// populated by the auth collaborator before resolution runs; reading them
/// earlier is a configuration error, not a client error.
pub struct HttpRequest {
    method: Method,
    path_params: IndexMap<String, String>,
    query_string: Vec<u8>,
    headers: IndexMap<String, String>,
    cookies: IndexMap<String, String>,
    state: Arc<AppState>,
    user: Option<ParamValue>,
    auth: Option<ParamValue>,
    body: Vec<u8>,
    json_cache: OnceCell<Value>,
    form_cache: OnceCell<FormData>,
}

impl HttpRequest {
    /// Creates an empty request with the given method.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path_params: IndexMap::new(),
            query_string: Vec::new(),
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            state: Arc::new(AppState::new()),
            user: None,
            auth: None,
            body: Vec::new(),
            json_cache: OnceCell::new(),
            form_cache: OnceCell::new(),
        }
    }

    /// Adds a matched path parameter.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Sets the raw query string.
    pub fn with_query_string(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.query_string = raw.into();
        self
    }

    /// Adds a header. Names are lowercased.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Populates the cookie map from a raw `Cookie:` header line.
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        self.cookies.extend(cookies_from_header(header));
        self
    }

    /// Shares the application state with this request.
    pub fn with_state(mut self, state: Arc<AppState>) -> Self {
        self.state = state;
        self
    }

    /// Populates the `user` slot (auth collaborator).
    pub fn with_user(mut self, user: impl Into<ParamValue>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Populates the `auth` slot (auth collaborator).
    pub fn with_auth(mut self, auth: impl Into<ParamValue>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Sets the raw request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Path parameters matched by the router.
    pub fn path_params(&self) -> &IndexMap<String, String> {
        &self.path_params
    }

    /// The raw query string.
    pub fn query_string(&self) -> &[u8] {
        &self.query_string
    }

    /// All headers, names lowercased.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Looks up one header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All cookies.
    pub fn cookies(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    /// The shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The authenticated user, if the auth collaborator has run.
    pub fn user(&self) -> ConfigResult<&ParamValue> {
        self.user.as_ref().ok_or(ConfigError::UserNotPopulated)
    }

    /// The auth credentials, if the auth collaborator has run.
    pub fn auth(&self) -> ConfigResult<&ParamValue> {
        self.auth.as_ref().ok_or(ConfigError::AuthNotPopulated)
    }

    /// Reads and parses the request body as JSON.
    ///
    /// The parse result is cached; repeated access within one request does
    /// not re-read the stream, and concurrent callers share one parse.
    pub async fn json(&self) -> Result<&Value, ValidationError> {
        self.json_cache
            .get_or_try_init(|| async {
                let body = self.read_body().await;
                let parsed = serde_json::from_slice(body)?;
                trace!("parsed json request body");
                Ok(parsed)
            })
            .await
    }

    /// Reads and parses the form payload, cached like [`json`](Self::json).
    ///
    /// Multipart when the Content-Type says so, url-encoded otherwise.
    pub async fn form(&self) -> Result<&FormData, ValidationError> {
        self.form_cache
            .get_or_try_init(|| async {
                let body = self.read_body().await;
                match self.header("content-type") {
                    Some(content_type) if content_type.starts_with("multipart/form-data") => {
                        let boundary = form::multipart_boundary(content_type).ok_or_else(|| {
                            ValidationError::body_decode("multipart Content-Type has no boundary")
                        })?;
                        form::parse_multipart(body, &boundary)
                    }
                    _ => form::parse_urlencoded(body),
                }
            })
            .await
    }

    /// The transport's body read; the suspension point for body I/O.
    async fn read_body(&self) -> &[u8] {
        &self.body
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path_params", &self.path_params)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// SocketSession
// =============================================================================

/// One persistent client session, established over a socket handshake.
///
/// Shares the HTTP request's parameter surface (path, query, headers,
/// cookies from the handshake) but has no method and no body.
pub struct SocketSession {
    path_params: IndexMap<String, String>,
    query_string: Vec<u8>,
    headers: IndexMap<String, String>,
    cookies: IndexMap<String, String>,
    state: Arc<AppState>,
    user: Option<ParamValue>,
    auth: Option<ParamValue>,
}

impl SocketSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self {
            path_params: IndexMap::new(),
            query_string: Vec::new(),
            headers: IndexMap::new(),
            cookies: IndexMap::new(),
            state: Arc::new(AppState::new()),
            user: None,
            auth: None,
        }
    }

    /// Adds a matched path parameter.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Sets the handshake query string.
    pub fn with_query_string(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.query_string = raw.into();
        self
    }

    /// Adds a handshake header. Names are lowercased.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Shares the application state with this session.
    pub fn with_state(mut self, state: Arc<AppState>) -> Self {
        self.state = state;
        self
    }

    /// Populates the `user` slot (auth collaborator).
    pub fn with_user(mut self, user: impl Into<ParamValue>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Populates the `auth` slot (auth collaborator).
    pub fn with_auth(mut self, auth: impl Into<ParamValue>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Path parameters matched by the router.
    pub fn path_params(&self) -> &IndexMap<String, String> {
        &self.path_params
    }

    /// The handshake query string.
    pub fn query_string(&self) -> &[u8] {
        &self.query_string
    }

    /// All handshake headers, names lowercased.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// All cookies.
    pub fn cookies(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    /// The shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The authenticated user, if the auth collaborator has run.
    pub fn user(&self) -> ConfigResult<&ParamValue> {
        self.user.as_ref().ok_or(ConfigError::UserNotPopulated)
    }

    /// The auth credentials, if the auth collaborator has run.
    pub fn auth(&self) -> ConfigResult<&ParamValue> {
        self.auth.as_ref().ok_or(ConfigError::AuthNotPopulated)
    }
}

impl Default for SocketSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("path_params", &self.path_params)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connection
// =============================================================================

/// The abstract boundary around one client request or session.
#[derive(Debug, Clone)]
pub enum Connection {
    /// An HTTP request.
    Http(Arc<HttpRequest>),
    /// A persistent socket session.
    Socket(Arc<SocketSession>),
}

impl Connection {
    /// Wraps an HTTP request.
    pub fn http(request: HttpRequest) -> Self {
        Self::Http(Arc::new(request))
    }

    /// Wraps a socket session.
    pub fn socket(session: SocketSession) -> Self {
        Self::Socket(Arc::new(session))
    }

    /// The variant name, for error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Socket(_) => "socket",
        }
    }

    /// Path parameters matched by the router.
    pub fn path_params(&self) -> &IndexMap<String, String> {
        match self {
            Self::Http(request) => request.path_params(),
            Self::Socket(session) => session.path_params(),
        }
    }

    /// The raw query string.
    pub fn query_string(&self) -> &[u8] {
        match self {
            Self::Http(request) => request.query_string(),
            Self::Socket(session) => session.query_string(),
        }
    }

    /// All headers, names lowercased.
    pub fn headers(&self) -> &IndexMap<String, String> {
        match self {
            Self::Http(request) => request.headers(),
            Self::Socket(session) => session.headers(),
        }
    }

    /// All cookies.
    pub fn cookies(&self) -> &IndexMap<String, String> {
        match self {
            Self::Http(request) => request.cookies(),
            Self::Socket(session) => session.cookies(),
        }
    }

    /// The shared application state.
    pub fn state(&self) -> &AppState {
        match self {
            Self::Http(request) => request.state(),
            Self::Socket(session) => session.state(),
        }
    }

    /// The authenticated user, if the auth collaborator has run.
    pub fn user(&self) -> ConfigResult<&ParamValue> {
        match self {
            Self::Http(request) => request.user(),
            Self::Socket(session) => session.user(),
        }
    }

    /// The auth credentials, if the auth collaborator has run.
    pub fn auth(&self) -> ConfigResult<&ParamValue> {
        match self {
            Self::Http(request) => request.auth(),
            Self::Socket(session) => session.auth(),
        }
    }

    /// The HTTP request, if this connection is one.
    pub fn as_http(&self) -> Option<&Arc<HttpRequest>> {
        match self {
            Self::Http(request) => Some(request),
            Self::Socket(_) => None,
        }
    }

    /// The socket session, if this connection is one.
    pub fn as_socket(&self) -> Option<&Arc<SocketSession>> {
        match self {
            Self::Http(_) => None,
            Self::Socket(session) => Some(session),
        }
    }
}
