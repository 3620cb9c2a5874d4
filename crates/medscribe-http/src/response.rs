//! JSON response formatting.

use crate::body::{GuardResponseBody, json_body};
use crate::error::GuardHttpError;

/// Content type for every guarded JSON response.
pub const CONTENT_TYPE: &str = "application/json";

/// Header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Serialize an error into the JSON error body.
///
/// Verification rejections carry their numeric code:
///
/// ```json
/// {
///   "code": 1105,
///   "error": "SKEWED_TIMESTAMP",
///   "message": "x-timestamp is outside the allowed clock skew of 300000 ms"
/// }
/// ```
///
/// Transport errors carry only `error` and `message`.
#[must_use]
pub fn error_to_json(error: &GuardHttpError) -> Vec<u8> {
    let mut body = serde_json::json!({
        "error": error.error_name(),
        "message": error.to_string(),
    });
    if let GuardHttpError::Rejected(err) = error {
        body["code"] = err.code().as_u16().into();
    }
    serde_json::to_vec(&body).expect("JSON serialization of error cannot fail")
}

/// Convert an error into a complete HTTP response.
///
/// `RATE_LIMITED` rejections also carry `retry-after` in whole seconds.
#[must_use]
pub fn error_to_response(
    error: &GuardHttpError,
    request_id: &str,
) -> http::Response<GuardResponseBody> {
    let body = json_body(error_to_json(error));

    let mut builder = http::Response::builder()
        .status(error.status_code())
        .header("content-type", CONTENT_TYPE)
        .header(REQUEST_ID_HEADER, request_id);
    if let GuardHttpError::Rejected(err) = error {
        if let Some(secs) = err.retry_after_secs() {
            builder = builder.header(http::header::RETRY_AFTER, secs);
        }
    }

    builder.body(body).expect("valid error response")
}

/// Build a JSON response with the given status.
#[must_use]
pub fn json_response(
    status: http::StatusCode,
    json: Vec<u8>,
    request_id: &str,
) -> http::Response<GuardResponseBody> {
    http::Response::builder()
        .status(status)
        .header("content-type", CONTENT_TYPE)
        .header(REQUEST_ID_HEADER, request_id)
        .body(json_body(json))
        .expect("valid JSON response")
}
