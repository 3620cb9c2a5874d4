//! Common type definitions shared across the guard crates.

use std::fmt;
use std::net::IpAddr;

/// Milliseconds since the Unix epoch, as carried in `x-timestamp`.
pub type EpochMillis = i64;

/// A caller identity token taken from the `api-key` header.
///
/// The `Debug` and `Display` impls only show a short prefix so the key can
/// appear in logs without leaking the credential.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    /// Number of leading characters kept by [`ApiKey::redacted`].
    const VISIBLE_PREFIX: usize = 4;

    /// Wrap a raw API key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the full key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the key in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// The key with everything after a short prefix masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(Self::VISIBLE_PREFIX).collect();
        format!("{prefix}****")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.redacted()).finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// The identity a rate-limit bucket is keyed on.
///
/// Requests are bucketed by API key when one is present; otherwise each
/// distinct peer address gets its own bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// Bucket for an authenticated caller.
    ApiKey(ApiKey),
    /// Bucket for an unauthenticated peer address.
    Ip(IpAddr),
    /// Shared bucket for requests with neither a key nor a known peer.
    Anonymous,
}

impl RateKey {
    /// Choose the bucket key for a request.
    #[must_use]
    pub fn resolve(api_key: Option<&ApiKey>, peer: Option<IpAddr>) -> Self {
        match (api_key, peer) {
            (Some(key), _) => Self::ApiKey(key.clone()),
            (None, Some(ip)) => Self::Ip(ip),
            (None, None) => Self::Anonymous,
        }
    }

    /// The string under which this bucket is stored.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::ApiKey(key) => format!("key:{}", key.as_str()),
            Self::Ip(ip) => format!("ip:{ip}"),
            Self::Anonymous => "anonymous".to_owned(),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(key) => write!(f, "key:{key}"),
            Self::Ip(ip) => write!(f, "ip:{ip}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}
