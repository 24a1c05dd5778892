//! The error taxonomy of the mesh data path.
//!
//! Every way a routed request can fail is a [`MeshError`] variant. Each
//! component crate has its own narrower error type and converts into
//! `MeshError` at the gateway boundary, so callers only ever match on one
//! enum:
//!
//! ```rust
//! use tower_mesh_core::{BackendError, MeshError};
//! use std::time::Duration;
//!
//! fn describe(err: &MeshError) -> &'static str {
//!     match err {
//!         MeshError::CircuitOpen { .. } => "breaker is shedding load",
//!         MeshError::Backend { source: BackendError::Timeout { .. }, .. } => "backend too slow",
//!         MeshError::Backend { .. } => "backend failed",
//!         _ => "rejected before reaching a backend",
//!     }
//! }
//!
//! let err = MeshError::Backend {
//!     instance: "users-1".into(),
//!     source: BackendError::Timeout { after: Duration::from_secs(2) },
//! };
//! assert_eq!(describe(&err), "backend too slow");
//! assert_eq!(err.status_code(), http::StatusCode::SERVICE_UNAVAILABLE);
//! ```

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single proxied backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The call did not complete within its deadline.
    #[error("backend timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The call failed below HTTP (connect refused, reset, DNS, ...).
    #[error("backend transport error: {message}")]
    Transport {
        /// Message from the transport layer, preserved verbatim.
        message: String,
    },

    /// The backend answered, but the client reported the status as a failure.
    #[error("backend returned {status}")]
    Status {
        /// Status the backend sent.
        status: StatusCode,
    },
}

impl BackendError {
    /// Shorthand for [`BackendError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        BackendError::Transport {
            message: message.into(),
        }
    }

    /// Returns `true` for [`BackendError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }
}

/// Why a request routed through the mesh did not get a backend response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    /// No route matches the request's method and path.
    #[error("no route for {method} {path}")]
    RouteNotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The client exhausted the route's request ceiling for this window.
    #[error("rate limit exceeded for client '{client}'")]
    RateLimitExceeded {
        /// Client identity the limit applies to.
        client: String,
        /// Time until the window reopens.
        retry_after: Option<Duration>,
    },

    /// The route requires authentication and the request was denied.
    #[error("unauthorized")]
    Unauthorized,

    /// Discovery returned no healthy instance of the target service.
    #[error("service unavailable: no healthy instances of '{service}'")]
    NoHealthyInstance {
        /// Target service name.
        service: String,
    },

    /// The selected instance's circuit breaker rejected the call.
    #[error("service unavailable: circuit open for instance '{instance}'")]
    CircuitOpen {
        /// Instance id whose breaker is open.
        instance: String,
    },

    /// The proxied call to the selected instance failed.
    #[error("service unavailable: instance '{instance}': {source}")]
    Backend {
        /// Instance id that was called.
        instance: String,
        /// Underlying failure, message preserved.
        #[source]
        source: BackendError,
    },

    /// A heartbeat arrived for an id the registry does not know.
    #[error("unknown instance '{id}'")]
    UnknownInstance {
        /// The unknown instance id.
        id: String,
    },
}

impl MeshError {
    /// HTTP status a transport should answer with for this error.
    ///
    /// Circuit-open, no-instance and backend failures all surface as
    /// `503 Service Unavailable`; the body (the `Display` text) tells them
    /// apart.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MeshError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            MeshError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            MeshError::Unauthorized => StatusCode::UNAUTHORIZED,
            MeshError::NoHealthyInstance { .. }
            | MeshError::CircuitOpen { .. }
            | MeshError::Backend { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MeshError::UnknownInstance { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Stable lowercase category name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            MeshError::RouteNotFound { .. } => "route_not_found",
            MeshError::RateLimitExceeded { .. } => "rate_limited",
            MeshError::Unauthorized => "unauthorized",
            MeshError::NoHealthyInstance { .. } => "no_healthy_instance",
            MeshError::CircuitOpen { .. } => "circuit_open",
            MeshError::Backend { .. } => "backend_error",
            MeshError::UnknownInstance { .. } => "unknown_instance",
        }
    }

    /// Returns `true` if this is a circuit breaker rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, MeshError::CircuitOpen { .. })
    }

    /// Returns `true` if this is a rate limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MeshError::RateLimitExceeded { .. })
    }

    /// Returns `true` if the backend call itself failed (including timeouts).
    pub fn is_backend(&self) -> bool {
        matches!(self, MeshError::Backend { .. })
    }

    /// Returns `true` if the backend call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            MeshError::Backend {
                source: BackendError::Timeout { .. },
                ..
            }
        )
    }

    /// Returns `true` for conditions that are routine under partial failure
    /// and should not be logged as errors.
    pub fn is_expected(&self) -> bool {
        !self.is_backend()
    }
}
