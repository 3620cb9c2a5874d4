//! Default handler for accepted requests.

use bytes::Bytes;
use medscribe_auth::verifier::VerifiedCaller;
use medscribe_http::dispatch::{GuardedHandler, HandlerFuture, RequestId};
use medscribe_http::error::GuardHttpError;
use medscribe_http::response::json_response;
use serde::Serialize;

/// Handler that answers every accepted request with a summary of the caller.
///
/// Useful as a smoke target when deploying the gateway in front of nothing,
/// and as the reference shape for real handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

/// JSON body returned by [`EchoHandler`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerSummary {
    /// Redacted API key.
    pub api_key: String,
    /// Client agent as `Product/Version (platform[; extra])`.
    pub agent: String,
    /// Calling product token.
    pub product: &'static str,
    /// Runtime platform token.
    pub platform: &'static str,
    /// Sender timestamp in epoch milliseconds.
    pub timestamp_ms: i64,
    /// Consumed nonce, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Requests left in the caller's window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_remaining: Option<u32>,
    /// Request method.
    pub method: String,
    /// Request path and query.
    pub path: String,
    /// Body length in bytes.
    pub body_bytes: usize,
}

impl CallerSummary {
    fn new(caller: &VerifiedCaller, parts: &http::request::Parts, body: &Bytes) -> Self {
        Self {
            api_key: caller.api_key.redacted(),
            agent: caller.agent.to_string(),
            product: caller.agent.product.as_str(),
            platform: caller.agent.platform.as_str(),
            timestamp_ms: caller.timestamp_ms,
            nonce: caller.nonce.clone(),
            rate_remaining: caller.rate_remaining,
            method: parts.method.to_string(),
            path: parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string),
            body_bytes: body.len(),
        }
    }
}

impl GuardedHandler for EchoHandler {
    fn handle(
        &self,
        caller: VerifiedCaller,
        parts: http::request::Parts,
        body: Bytes,
    ) -> HandlerFuture {
        let summary = CallerSummary::new(&caller, &parts, &body);
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        Box::pin(async move {
            let json =
                serde_json::to_vec(&summary).map_err(|e| GuardHttpError::Handler(e.to_string()))?;
            Ok(json_response(http::StatusCode::OK, json, &request_id))
        })
    }
}
