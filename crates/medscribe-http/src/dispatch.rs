//! Handler trait for accepted requests.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use medscribe_auth::verifier::VerifiedCaller;

use crate::body::GuardResponseBody;
use crate::error::GuardHttpError;

/// Identifier assigned to a request, stored in its extensions before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Response future returned by a [`GuardedHandler`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<GuardResponseBody>, GuardHttpError>> + Send>>;

/// Business logic behind the guard.
///
/// Only requests that passed every verification check reach the handler. It
/// receives the verified caller, the request head, and the raw body bytes, and
/// returns a complete response.
pub trait GuardedHandler: Send + Sync + 'static {
    /// Handle an accepted request.
    fn handle(
        &self,
        caller: VerifiedCaller,
        parts: http::request::Parts,
        body: Bytes,
    ) -> HandlerFuture;
}

/// Dispatch an accepted request to the handler.
pub async fn dispatch_request<H: GuardedHandler>(
    handler: &H,
    caller: VerifiedCaller,
    parts: http::request::Parts,
    body: Bytes,
) -> Result<http::Response<GuardResponseBody>, GuardHttpError> {
    tracing::debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        api_key = %caller.api_key,
        "dispatching accepted request"
    );
    handler.handle(caller, parts, body).await
}
