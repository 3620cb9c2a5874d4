//! Header names exchanged between signer and verifier.
//!
//! All names are lowercase; `http::HeaderMap` lookups are case-insensitive.

/// Caller identity token.
pub const API_KEY: &str = "api-key";
/// Structured client agent, `Product/Version (Platform[; extra])`.
pub const CLIENT_AGENT: &str = "x-client-agent";
/// Older spelling of [`CLIENT_AGENT`] still sent by some clients.
pub const LEGACY_CLIENT_AGENT: &str = "x-client-user-agent";
/// Sender wall clock in epoch milliseconds.
pub const TIMESTAMP: &str = "x-timestamp";
/// Path and query the signature was computed over.
pub const PATH: &str = "x-path";
/// `sha256=<hex>` HMAC of the canonical string.
pub const SIGNATURE: &str = "x-signature";
/// Optional single-use token.
pub const NONCE: &str = "x-nonce";
