//! Gateway service in front of the guarded handler.
//!
//! Health probes (`GET /health`, `GET /_health`) are answered here, before any
//! verification, so load balancers and container runtimes need no credentials.
//! Every other request goes through [`GuardedHttpService`].

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use bytes::Bytes;
use hyper::service::Service;
use medscribe_http::body::{GuardResponseBody, json_body};
use medscribe_http::dispatch::GuardedHandler;
use medscribe_http::service::GuardedHttpService;

use crate::VERSION;

/// Gateway that intercepts health probes and guards everything else.
#[derive(Debug)]
pub struct GatewayService<H: GuardedHandler> {
    guarded: GuardedHttpService<H>,
}

impl<H: GuardedHandler> GatewayService<H> {
    /// Create a new gateway around a guarded service.
    pub fn new(guarded: GuardedHttpService<H>) -> Self {
        Self { guarded }
    }

    /// A copy of this gateway for a connection from `peer`.
    #[must_use]
    pub fn with_peer(&self, peer: IpAddr) -> Self {
        Self {
            guarded: self.guarded.with_peer(peer),
        }
    }
}

impl<H: GuardedHandler> Clone for GatewayService<H> {
    fn clone(&self) -> Self {
        Self {
            guarded: self.guarded.clone(),
        }
    }
}

impl<H, B> Service<http::Request<B>> for GatewayService<H>
where
    H: GuardedHandler,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Display + Send,
{
    type Response = http::Response<GuardResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        if is_health_check(req.method(), req.uri().path()) {
            return Box::pin(async { Ok(health_check_response()) });
        }
        self.guarded.call(req)
    }
}

/// Check if the request is a health probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/health" || path == "/_health")
}

/// Produce the health probe response.
fn health_check_response() -> http::Response<GuardResponseBody> {
    let body = serde_json::json!({ "status": "ok", "version": VERSION });
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("content-type", "application/json")
        .body(json_body(body.to_string()))
        .expect("static health response should be valid")
}
