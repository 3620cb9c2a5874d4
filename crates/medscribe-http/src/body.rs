//! Response body type.
//!
//! Every guarded response is a single buffered JSON document, so the body is
//! a plain [`Full`] over [`Bytes`].

use bytes::Bytes;
use http_body_util::Full;

/// Body of every response produced by the guard.
pub type GuardResponseBody = Full<Bytes>;

/// Wrap an already serialized JSON document.
#[must_use]
pub fn json_body(json: impl Into<Bytes>) -> GuardResponseBody {
    Full::new(json.into())
}
