//! Guarded HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use medscribe_auth::verifier::{RequestContext, Verifier};

use crate::body::GuardResponseBody;
use crate::dispatch::{GuardedHandler, RequestId, dispatch_request};
use crate::error::GuardHttpError;
use crate::response::{CONTENT_TYPE, REQUEST_ID_HEADER, error_to_response};
use crate::signable::decode_signable_body;

/// Hyper `Service` that verifies every request before handing it on.
///
/// One service value is shared by all connections; [`with_peer`] produces a
/// per-connection copy that knows the remote address, which the rate limiter
/// falls back to when a request carries no API key.
///
/// [`with_peer`]: GuardedHttpService::with_peer
#[derive(Debug)]
pub struct GuardedHttpService<H: GuardedHandler> {
    handler: Arc<H>,
    verifier: Arc<Verifier>,
    peer: Option<IpAddr>,
}

impl<H: GuardedHandler> GuardedHttpService<H> {
    /// Create a new `GuardedHttpService`.
    pub fn new(handler: Arc<H>, verifier: Arc<Verifier>) -> Self {
        Self {
            handler,
            verifier,
            peer: None,
        }
    }

    /// A copy of this service for a connection from `peer`.
    #[must_use]
    pub fn with_peer(&self, peer: IpAddr) -> Self {
        Self {
            peer: Some(peer),
            ..self.clone()
        }
    }
}

impl<H: GuardedHandler> Clone for GuardedHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            verifier: Arc::clone(&self.verifier),
            peer: self.peer,
        }
    }
}

impl<H, B> hyper::service::Service<http::Request<B>> for GuardedHttpService<H>
where
    H: GuardedHandler,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Display + Send,
{
    type Response = http::Response<GuardResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let verifier = Arc::clone(&self.verifier);
        let peer = self.peer;
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let response =
                process_request(req, handler.as_ref(), &verifier, peer, &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Run one request through body collection, verification, and dispatch.
async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &H,
    verifier: &Verifier,
    peer: Option<IpAddr>,
    request_id: &str,
) -> http::Response<GuardResponseBody>
where
    H: GuardedHandler,
    B: http_body::Body<Data = Bytes>,
    B::Error: Display,
{
    let (mut parts, incoming) = req.into_parts();

    // 1. Collect body.
    let body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => return error_to_response(&err, request_id),
    };

    // 2. Normalize it the way the signer did.
    let content_type = parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let signable = decode_signable_body(content_type, body.clone());

    // 3. Verify.
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), http::uri::PathAndQuery::as_str);
    let ctx = RequestContext::from_parts(&parts, path_and_query, &signable, peer);
    let caller = match verifier.verify(&ctx).await {
        Ok(caller) => caller,
        Err(err) => return error_to_response(&GuardHttpError::Rejected(err), request_id),
    };

    // 4. Dispatch.
    parts.extensions.insert(RequestId(request_id.to_owned()));
    match dispatch_request(handler, caller, parts, body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "handler failed");
            error_to_response(&err, request_id)
        }
    }
}

async fn collect_body<B>(incoming: B) -> Result<Bytes, GuardHttpError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Display,
{
    incoming
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| GuardHttpError::BodyRead(e.to_string()))
}

/// Add headers every guarded response carries.
fn add_common_headers(
    mut response: http::Response<GuardResponseBody>,
    request_id: &str,
) -> http::Response<GuardResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry(REQUEST_ID_HEADER).or_insert(hv);
    }

    headers
        .entry("content-type")
        .or_insert(http::HeaderValue::from_static(CONTENT_TYPE));

    headers.insert("server", http::HeaderValue::from_static("MedScribe"));

    response
}
