//! Unified error types for the resolution core.
//!
//! Two families matter to callers: configuration errors are server-authored
//! mistakes that should fail fast at the first resolution attempt, while
//! validation errors are client-caused and surface as a 4xx-class response
//! in the embedding framework. The core raises; it never logs responses or
//! formats them.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Server-authored mistakes in handler or provider registration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A reserved field was declared on the wrong connection variant.
    #[error("'{field}' is not supported with {connection} handlers")]
    WrongConnection {
        /// The reserved field name.
        field: &'static str,
        /// The variant the connection actually is.
        connection: &'static str,
    },

    /// A `data` field was declared on a handler bound to a bodyless method.
    #[error("'data' is unsupported for {method} requests")]
    BodyNotAllowed {
        /// The offending request method.
        method: &'static str,
    },

    /// `user` was read before the auth collaborator populated it.
    #[error("user is not set on the connection; install an auth middleware to populate it")]
    UserNotPopulated,

    /// `auth` was read before the auth collaborator populated it.
    #[error("auth is not set on the connection; install an auth middleware to populate it")]
    AuthNotPopulated,

    /// The provider graph references itself.
    #[error("provider cycle detected: {path}")]
    ProviderCycle {
        /// The resolution chain, rendered `a -> b -> a`.
        path: String,
    },
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Client-caused failures carrying the offending parameter or reason.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// A required parameter was absent from its declared source.
    #[error("missing required parameter '{name}'")]
    MissingParameter {
        /// The alias or field name that was looked up.
        name: String,
    },

    /// The request body could not be decoded.
    #[error("failed to decode request body: {reason}")]
    BodyDecode {
        /// What the decoder rejected.
        reason: String,
    },

    /// The signature model rejected the resolved values.
    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidParameter {
        /// The rejected field name.
        name: String,
        /// Why the model rejected it.
        reason: String,
    },
}

impl ValidationError {
    /// Creates a body-decode error from any displayable reason.
    pub fn body_decode(reason: impl std::fmt::Display) -> Self {
        Self::BodyDecode {
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::body_decode(err)
    }
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Any failure raised while resolving a signature's kwargs.
///
/// Propagates unhandled to the invoking request-handling layer, which maps
/// the kind to its response policy.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Server-authored registration mistake.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Client-caused validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A provider factory failed while producing its value.
    #[error("provider '{name}' failed: {reason}")]
    Provider {
        /// The provider's registered name.
        name: String,
        /// The factory's own failure description.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a provider-failure error.
    pub fn provider(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Provider {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
