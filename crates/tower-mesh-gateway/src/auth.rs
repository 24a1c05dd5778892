//! Request authentication for routes that require it.

use crate::request::GatewayRequest;
use http::header::AUTHORIZATION;

/// Decides whether a request may reach an auth-required route.
///
/// Called inline on the dispatch path, so implementations should be fast and
/// must not block. Closures taking `&GatewayRequest` and returning `bool`
/// implement this trait.
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `true` to let the request through.
    fn authenticate(&self, request: &GatewayRequest) -> bool;
}

impl<F> Authenticator for F
where
    F: Fn(&GatewayRequest) -> bool + Send + Sync + 'static,
{
    fn authenticate(&self, request: &GatewayRequest) -> bool {
        self(request)
    }
}

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn authenticate(&self, _request: &GatewayRequest) -> bool {
        true
    }
}

/// Accepts requests carrying a non-empty `Authorization: Bearer` token.
///
/// The token is not validated; pair this with a real authenticator when the
/// gateway is exposed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTokenPresent;

impl Authenticator for BearerTokenPresent {
    fn authenticate(&self, request: &GatewayRequest) -> bool {
        request
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| !token.trim().is_empty())
    }
}
