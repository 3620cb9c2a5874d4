//! Canonical request construction and HMAC computation.
//!
//! The canonical string is the exact input to the HMAC:
//!
//! ```text
//! METHOD\n
//! PATH\n
//! TIMESTAMP\n
//! BODYHASH
//! ```
//!
//! `METHOD` is the uppercase HTTP verb, `PATH` the path and query string as
//! the server receives them, `TIMESTAMP` the decimal epoch-millisecond string
//! sent in `x-timestamp`, and `BODYHASH` the lowercase hex SHA-256 of the
//! normalized body. The field order is part of the wire format; reordering it
//! breaks every deployed signer.

use hmac::{Hmac, KeyInit, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::body::SignableBody;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by the `x-signature` header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the hex SHA-256 of the normalized body.
///
/// # Examples
///
/// ```
/// use medscribe_auth::body::SignableBody;
/// use medscribe_auth::canonical::hash_body;
///
/// // SHA-256 of the empty string
/// assert_eq!(
///     hash_body(&SignableBody::Empty),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_body(body: &SignableBody) -> String {
    hex::encode(Sha256::digest(body.canonical_bytes().as_ref()))
}

/// Build the canonical string from its four fields.
///
/// # Examples
///
/// ```
/// use medscribe_auth::canonical::build_canonical_string;
///
/// let canonical = build_canonical_string("post", "/reports?draft=1", "1000", "abc");
/// assert_eq!(canonical, "POST\n/reports?draft=1\n1000\nabc");
/// ```
#[must_use]
pub fn build_canonical_string(method: &str, path: &str, timestamp: &str, body_hash: &str) -> String {
    let method = method.to_ascii_uppercase();
    format!("{method}\n{path}\n{timestamp}\n{body_hash}")
}

/// Compute the hex HMAC-SHA256 of `canonical` under `secret`.
#[must_use]
pub fn compute_signature(secret: &[u8], canonical: &str) -> String {
    hex::encode(hmac_sha256(secret, canonical.as_bytes()))
}

/// Sign a request: hash the body, build the canonical string, and HMAC it.
///
/// Returns the lowercase hex signature without the `sha256=` prefix.
#[must_use]
pub fn sign_request(
    secret: &[u8],
    method: &str,
    path: &str,
    body: &SignableBody,
    timestamp: &str,
) -> String {
    let body_hash = hash_body(body);
    let canonical = build_canonical_string(method, path, timestamp, &body_hash);
    compute_signature(secret, &canonical)
}

/// Compare a presented signature with the expected one in constant time.
///
/// The presented value may carry the `sha256=` prefix; hex case is ignored.
#[must_use]
pub fn signatures_match(presented: &str, expected_hex: &str) -> bool {
    let presented = presented
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(presented.trim())
        .to_ascii_lowercase();
    presented.as_bytes().ct_eq(expected_hex.as_bytes()).into()
}

/// Compute HMAC-SHA256 and return the raw bytes.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
