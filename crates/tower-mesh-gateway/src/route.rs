//! Route descriptors and path patterns.

use http::Method;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tower_mesh_loadbalancer::LoadBalanceStrategy;
use tower_mesh_ratelimiter::RateLimit;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A path pattern made of literal segments and `:param` wildcards.
///
/// Empty segments are ignored, so `/api/users/` and `/api/users` are the
/// same pattern and match the same paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parses a pattern such as `/api/users/:id`.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the `:param` segments, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches `path`, capturing parameters. Each `:param` matches exactly
    /// one non-empty segment.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::default();
        let mut parts = split_path(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push(name, part),
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }

    /// Renders this pattern as a path, substituting `:param` segments from
    /// `params`. Parameters without a captured value are left as written.
    pub fn render(&self, params: &PathParams) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }

        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Param(name) => match params.get(name) {
                    Some(value) => path.push_str(value),
                    None => {
                        path.push(':');
                        path.push_str(name);
                    }
                },
            }
        }
        path
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Parameters captured from a matched path, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Value captured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of captured parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Binds a (method, path pattern) to a target service with its policy.
///
/// ```rust
/// use std::time::Duration;
/// use tower_mesh_gateway::Route;
/// use tower_mesh_loadbalancer::LoadBalanceStrategy;
/// use tower_mesh_ratelimiter::RateLimit;
///
/// let route = Route::get("/api/users/:id", "user-service")
///     .rewrite("/users/:id")
///     .require_auth()
///     .rate_limit(RateLimit::per_minute(600))
///     .timeout(Duration::from_secs(2))
///     .strategy(LoadBalanceStrategy::LeastConnections);
///
/// assert_eq!(route.label(), "GET /api/users/:id");
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    service: String,
    version: Option<String>,
    rewrite: Option<RoutePattern>,
    auth_required: bool,
    rate_limit: Option<RateLimit>,
    timeout: Option<Duration>,
    strategy: Option<LoadBalanceStrategy>,
    label: String,
}

impl Route {
    /// Creates a route with no auth, no rate limit, the gateway's default
    /// timeout and strategy, and no rewrite.
    pub fn new(method: Method, pattern: &str, service: impl Into<String>) -> Self {
        let pattern = RoutePattern::parse(pattern);
        let label = format!("{} {}", method, pattern);
        Self {
            method,
            pattern,
            service: service.into(),
            version: None,
            rewrite: None,
            auth_required: false,
            rate_limit: None,
            timeout: None,
            strategy: None,
            label,
        }
    }

    /// `GET` route.
    pub fn get(pattern: &str, service: impl Into<String>) -> Self {
        Self::new(Method::GET, pattern, service)
    }

    /// `POST` route.
    pub fn post(pattern: &str, service: impl Into<String>) -> Self {
        Self::new(Method::POST, pattern, service)
    }

    /// `PUT` route.
    pub fn put(pattern: &str, service: impl Into<String>) -> Self {
        Self::new(Method::PUT, pattern, service)
    }

    /// `PATCH` route.
    pub fn patch(pattern: &str, service: impl Into<String>) -> Self {
        Self::new(Method::PATCH, pattern, service)
    }

    /// `DELETE` route.
    pub fn delete(pattern: &str, service: impl Into<String>) -> Self {
        Self::new(Method::DELETE, pattern, service)
    }

    /// Only route to instances registered with this version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Rewrites the backend path from a template whose `:param` segments are
    /// filled from the matched path.
    pub fn rewrite(mut self, template: &str) -> Self {
        self.rewrite = Some(RoutePattern::parse(template));
        self
    }

    /// Requires the gateway's authenticator to allow the request.
    pub fn require_auth(mut self) -> Self {
        self.auth_required = true;
        self
    }

    /// Limits each client to `limit` on this route.
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// Bounds each proxied call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the gateway's default selection strategy.
    pub fn strategy(mut self, strategy: LoadBalanceStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Target service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Version filter, if any.
    pub fn version_filter(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Rewrite template, if any.
    pub fn rewrite_template(&self) -> Option<&RoutePattern> {
        self.rewrite.as_ref()
    }

    /// Whether the route requires authentication.
    pub fn auth_required(&self) -> bool {
        self.auth_required
    }

    /// Per-client limit, if any.
    pub fn rate_limit_policy(&self) -> Option<&RateLimit> {
        self.rate_limit.as_ref()
    }

    /// Per-call timeout override, if any.
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Strategy override, if any.
    pub fn strategy_override(&self) -> Option<LoadBalanceStrategy> {
        self.strategy
    }

    /// `METHOD pattern`, used as the metrics label and rate-limit scope.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns captured parameters if the route accepts this request.
    pub fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if &self.method != method {
            return None;
        }
        self.pattern.matches(path)
    }

    /// The path to send to the backend for a request matched with `params`.
    pub fn backend_path(&self, path: &str, params: &PathParams) -> String {
        match &self.rewrite {
            Some(template) => template.render(params),
            None => path.to_string(),
        }
    }
}

/// Returned when a declarative route cannot be turned into a [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The method is not a valid HTTP method token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
}

/// Declarative form of a [`Route`], for hosts that load routes from their own
/// configuration.
///
/// ```rust
/// use tower_mesh_gateway::{Route, RouteSpec};
///
/// let spec = RouteSpec {
///     method: "get".into(),
///     path: "/api/orders/:id".into(),
///     service: "order-service".into(),
///     auth_required: true,
///     timeout_ms: Some(1500),
///     ..RouteSpec::default()
/// };
/// let route = Route::try_from(spec).unwrap();
/// assert_eq!(route.label(), "GET /api/orders/:id");
/// assert!(route.auth_required());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouteSpec {
    /// HTTP method, case-insensitive.
    pub method: String,
    /// Path pattern.
    pub path: String,
    /// Target service name.
    pub service: String,
    /// Version filter.
    pub version: Option<String>,
    /// Rewrite template.
    pub rewrite: Option<String>,
    /// Whether auth is required.
    pub auth_required: bool,
    /// Per-client limit.
    pub rate_limit: Option<RateLimit>,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Strategy override.
    pub strategy: Option<LoadBalanceStrategy>,
}

impl TryFrom<RouteSpec> for Route {
    type Error = RouteError;

    fn try_from(spec: RouteSpec) -> Result<Self, Self::Error> {
        let method = Method::from_bytes(spec.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| RouteError::InvalidMethod(spec.method.clone()))?;

        let mut route = Route::new(method, &spec.path, spec.service);
        route.version = spec.version;
        route.rewrite = spec.rewrite.as_deref().map(RoutePattern::parse);
        route.auth_required = spec.auth_required;
        route.rate_limit = spec.rate_limit;
        route.timeout = spec.timeout_ms.map(Duration::from_millis);
        route.strategy = spec.strategy;
        Ok(route)
    }
}
