//! Transport-neutral request and response types.
//!
//! The gateway never speaks HTTP on the wire. A host transport converts its
//! requests into [`GatewayRequest`], and the backend client is a
//! `tower::Service<BackendCall>` that does the actual proxying.

use crate::route::PathParams;
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::time::Duration;
use tower_mesh_core::MeshError;
use tower_mesh_registry::ServiceInstance;

/// A request arriving at the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Request method.
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// Client identity used for rate limiting, usually the peer address.
    pub client: String,
}

impl GatewayRequest {
    /// Creates a request for `uri`, which may carry a query string.
    /// The client identity defaults to `"anonymous"`.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            client: "anonymous".to_string(),
        }
    }

    /// Sets the client identity.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// The request forwarded to a backend, after path rewriting.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Request method.
    pub method: Method,
    /// Backend path.
    pub path: String,
    /// Query string passed through unchanged.
    pub query: Option<String>,
    /// Request headers passed through unchanged.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// Parameters captured by the matched route.
    pub params: PathParams,
}

impl BackendRequest {
    /// Path plus query string.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}

/// One proxied call: the selected instance and what to send it.
#[derive(Debug, Clone)]
pub struct BackendCall {
    /// Instance chosen by the load balancer.
    pub instance: ServiceInstance,
    /// Request to forward.
    pub request: BackendRequest,
}

impl BackendCall {
    /// Absolute URL of the call, `http://host:port/path?query`.
    pub fn url(&self) -> String {
        format!(
            "http://{}{}",
            self.instance.address(),
            self.request.path_and_query()
        )
    }
}

/// What a backend answered.
///
/// Any status counts as a successful call for the circuit breaker. Backend
/// clients that treat some statuses as failures return
/// [`BackendError::Status`](tower_mesh_core::BackendError::Status) instead.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl BackendResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with `body`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }
}

/// What the gateway answers the client.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// Id of the instance that served the request, if one did.
    pub served_by: Option<String>,
}

impl GatewayResponse {
    /// Wraps a backend response, tagging it with the serving instance under
    /// `header`.
    pub fn from_backend(response: BackendResponse, instance: &str, header: &HeaderName) -> Self {
        let mut headers = response.headers;
        if let Ok(value) = HeaderValue::from_str(instance) {
            headers.insert(header.clone(), value);
        }
        Self {
            status: response.status,
            headers,
            body: response.body,
            served_by: Some(instance.to_string()),
        }
    }

    /// Renders an error: its status, its message as a plain-text body, and
    /// `Retry-After` when the client was rate limited.
    pub fn from_error(error: &MeshError) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let MeshError::RateLimitExceeded {
            retry_after: Some(retry_after),
            ..
        } = error
        {
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(*retry_after)));
        }

        let served_by = match error {
            MeshError::Backend { instance, .. } => Some(instance.clone()),
            _ => None,
        };

        Self {
            status: error.status_code(),
            headers,
            body: Bytes::from(error.to_string()),
            served_by,
        }
    }

    /// Body as UTF-8, lossy.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Whole seconds, rounded up.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
