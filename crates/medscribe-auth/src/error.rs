//! Error types for request verification.
//!
//! Every rejection the verifier can produce is a [`VerifyError`] variant, and
//! every variant maps to a stable numeric [`ErrorCode`]. Codes are grouped by
//! category in blocks of one hundred and are never renumbered or reused;
//! clients branch on the number, not on the message text.

use std::fmt;
use std::time::Duration;

/// Broad class of a rejection, matching the thousand/hundred block of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// 1000s: the caller's credentials are missing or malformed.
    Identity,
    /// 1100s: the request is inconsistent with what was signed.
    Integrity,
    /// 1200s: replay and rate protection.
    AbuseControl,
    /// 1300s: a dependency of the verifier could not answer.
    Upstream,
}

impl ErrorCategory {
    /// Lowercase name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Integrity => "integrity",
            Self::AbuseControl => "abuse-control",
            Self::Upstream => "upstream",
        }
    }
}

/// Stable numeric verification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// The request passed every check.
    Ok = 0,
    /// No `api-key` header.
    MissingApiKey = 1001,
    /// `api-key` shorter than the configured minimum.
    InvalidApiKey = 1002,
    /// `x-client-agent` missing or outside the grammar/allow-lists.
    BadUserAgent = 1101,
    /// `x-timestamp` missing or not a finite number.
    MissingTimestamp = 1102,
    /// No `x-path` header.
    MissingPath = 1103,
    /// `x-path` differs from the request path.
    PathMismatch = 1104,
    /// `x-timestamp` further from server time than the skew bound.
    SkewedTimestamp = 1105,
    /// `x-signature` missing or not the HMAC of the canonical string.
    InvalidSignature = 1106,
    /// Fixed-window ceiling reached for this caller.
    RateLimited = 1201,
    /// `x-nonce` already consumed.
    ReplayNonce = 1202,
    /// Nonce store or rate limiter failed under a fail-closed policy.
    UpstreamUnavailable = 1301,
}

impl ErrorCode {
    /// The numeric wire value.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// The symbolic wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::MissingApiKey => "MISSING_API_KEY",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::BadUserAgent => "BAD_USER_AGENT",
            Self::MissingTimestamp => "MISSING_TIMESTAMP",
            Self::MissingPath => "MISSING_PATH",
            Self::PathMismatch => "PATH_MISMATCH",
            Self::SkewedTimestamp => "SKEWED_TIMESTAMP",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::RateLimited => "RATE_LIMITED",
            Self::ReplayNonce => "REPLAY_NONCE",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
        }
    }

    /// The category block this code belongs to, or `None` for [`ErrorCode::Ok`].
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        match self.as_u16() {
            0 => None,
            1000..=1099 => Some(ErrorCategory::Identity),
            1100..=1199 => Some(ErrorCategory::Integrity),
            1200..=1299 => Some(ErrorCategory::AbuseControl),
            _ => Some(ErrorCategory::Upstream),
        }
    }

    /// HTTP status a host should answer with.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::Ok => http::StatusCode::OK,
            Self::BadUserAgent | Self::ReplayNonce => http::StatusCode::FORBIDDEN,
            Self::RateLimited => http::StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            _ => http::StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether a client may resend (after re-signing) and expect a different result.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SkewedTimestamp | Self::RateLimited | Self::ReplayNonce | Self::UpstreamUnavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.as_u16())
    }
}

/// A request rejection.
///
/// Messages are safe to return to callers: they never include the expected
/// signature, the secret, or the presented key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The `api-key` header is absent.
    #[error("Missing api-key header")]
    MissingApiKey,

    /// The `api-key` header is shorter than allowed.
    #[error("api-key must be at least {min_len} characters")]
    InvalidApiKey {
        /// Configured minimum length.
        min_len: usize,
    },

    /// The client agent header is absent or does not match the grammar.
    #[error("Missing or unrecognized x-client-agent header")]
    BadUserAgent,

    /// The `x-timestamp` header is absent or not numeric.
    #[error("Missing or non-numeric x-timestamp header")]
    MissingTimestamp,

    /// The `x-timestamp` header is too far from server time.
    #[error("x-timestamp is outside the allowed clock skew of {max_skew_ms} ms")]
    SkewedTimestamp {
        /// Configured skew bound.
        max_skew_ms: i64,
    },

    /// The `x-path` header is absent.
    #[error("Missing x-path header")]
    MissingPath,

    /// The `x-path` header does not equal the request path.
    #[error("x-path does not match the request path")]
    PathMismatch,

    /// The signature header is absent or wrong.
    #[error("Request signature is invalid")]
    InvalidSignature,

    /// The nonce was already consumed.
    #[error("Nonce has already been used")]
    ReplayNonce,

    /// The caller exhausted its window.
    #[error("Rate limit exceeded, retry in {retry_after_ms} ms")]
    RateLimited {
        /// Time until the caller's window resets.
        retry_after_ms: i64,
    },

    /// A backing store failed and the policy is fail-closed.
    #[error("{dependency} is unavailable")]
    UpstreamUnavailable {
        /// Which dependency failed.
        dependency: &'static str,
    },
}

impl VerifyError {
    /// The stable numeric code for this rejection.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingApiKey => ErrorCode::MissingApiKey,
            Self::InvalidApiKey { .. } => ErrorCode::InvalidApiKey,
            Self::BadUserAgent => ErrorCode::BadUserAgent,
            Self::MissingTimestamp => ErrorCode::MissingTimestamp,
            Self::SkewedTimestamp { .. } => ErrorCode::SkewedTimestamp,
            Self::MissingPath => ErrorCode::MissingPath,
            Self::PathMismatch => ErrorCode::PathMismatch,
            Self::InvalidSignature => ErrorCode::InvalidSignature,
            Self::ReplayNonce => ErrorCode::ReplayNonce,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
        }
    }

    /// Seconds a client should wait before retrying, when known.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => {
                let millis = u64::try_from(*retry_after_ms).unwrap_or(0);
                Some(millis.div_ceil(1000).max(1))
            }
            _ => None,
        }
    }
}

/// Failure of a nonce store or rate limiter backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend reported an error.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The backend did not answer in time.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}
