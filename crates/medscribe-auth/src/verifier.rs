//! Server-side request verification.
//!
//! A [`Verifier`] runs a fixed, ordered list of [`Check`]s against an inbound
//! request and stops at the first failure:
//!
//! 1. API key presence and length
//! 2. Client agent grammar and allow-lists
//! 3. Timestamp freshness
//! 4. Path binding
//! 5. HMAC signature (skipped when disabled in [`GuardConfig`])
//! 6. Nonce replay
//! 7. Fixed-window rate limit
//!
//! Steps 1 to 5 are pure functions of the headers, the clock, and the secret.
//! Steps 6 and 7 call the injected [`NonceStore`] and [`RateLimiter`]; each
//! call is bounded by the configured store timeout, and a failed or timed-out
//! call is resolved by the [`StoreFailurePolicy`].

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use http::HeaderMap;
use medscribe_core::{
    ApiKey, Clock, EpochMillis, GuardConfig, RateKey, StoreFailurePolicy, SystemClock,
};
use tracing::{debug, error, warn};

use crate::body::SignableBody;
use crate::canonical;
use crate::error::{StoreError, VerifyError};
use crate::headers;
use crate::store::{NonceStore, RateDecision, RateLimiter};
use crate::user_agent::ClientAgent;

/// The parts of an inbound request the verifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// HTTP method as received.
    pub method: &'a str,
    /// Path and query string exactly as received.
    pub path_and_query: &'a str,
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Normalized body.
    pub body: &'a SignableBody,
    /// Address of the connected peer, when known.
    pub peer: Option<IpAddr>,
}

impl<'a> RequestContext<'a> {
    /// Borrow the method, path and headers from `parts`.
    pub fn from_parts(
        parts: &'a http::request::Parts,
        path_and_query: &'a str,
        body: &'a SignableBody,
        peer: Option<IpAddr>,
    ) -> Self {
        Self {
            method: parts.method.as_str(),
            path_and_query,
            headers: &parts.headers,
            body,
            peer,
        }
    }
}

/// One step of the verification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// `api-key` present and long enough.
    ApiKey,
    /// `x-client-agent` well formed and allow-listed.
    UserAgent,
    /// `x-timestamp` within the skew bound.
    Timestamp,
    /// `x-path` equal to the request path.
    Path,
    /// `x-signature` equal to the recomputed HMAC.
    Signature,
    /// `x-nonce`, if sent, not seen before.
    Nonce,
    /// Caller under its window ceiling.
    RateLimit,
}

impl Check {
    /// Every check, in execution order.
    pub const ORDERED: [Self; 7] = [
        Self::ApiKey,
        Self::UserAgent,
        Self::Timestamp,
        Self::Path,
        Self::Signature,
        Self::Nonce,
        Self::RateLimit,
    ];

    /// Short name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::UserAgent => "user_agent",
            Self::Timestamp => "timestamp",
            Self::Path => "path",
            Self::Signature => "signature",
            Self::Nonce => "nonce",
            Self::RateLimit => "rate_limit",
        }
    }
}

/// What an accepted request proved about its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCaller {
    /// The presented key. Not checked against any registry.
    pub api_key: ApiKey,
    /// The parsed client agent.
    pub agent: ClientAgent,
    /// The sender timestamp, truncated to whole milliseconds.
    pub timestamp_ms: EpochMillis,
    /// The consumed nonce, if one was sent.
    pub nonce: Option<String>,
    /// Requests left in the caller's window; `None` if the limiter was bypassed.
    pub rate_remaining: Option<u32>,
}

/// Values collected by earlier checks for later ones.
#[derive(Debug, Default)]
struct Evidence {
    api_key: Option<ApiKey>,
    agent: Option<ClientAgent>,
    timestamp_ms: Option<EpochMillis>,
    nonce: Option<String>,
    rate_remaining: Option<u32>,
}

impl Evidence {
    fn into_caller(self) -> Result<VerifiedCaller, VerifyError> {
        Ok(VerifiedCaller {
            api_key: self.api_key.ok_or(VerifyError::MissingApiKey)?,
            agent: self.agent.ok_or(VerifyError::BadUserAgent)?,
            timestamp_ms: self.timestamp_ms.ok_or(VerifyError::MissingTimestamp)?,
            nonce: self.nonce,
            rate_remaining: self.rate_remaining,
        })
    }
}

/// Ordered request verification pipeline.
#[derive(Debug, Clone)]
pub struct Verifier {
    config: Arc<GuardConfig>,
    nonces: Arc<dyn NonceStore>,
    limiter: Arc<dyn RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl Verifier {
    /// Create a verifier over the given stores, reading the system clock.
    pub fn new(
        config: GuardConfig,
        nonces: Arc<dyn NonceStore>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            nonces,
            limiter,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for timestamp freshness.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// The checks this verifier runs, in order.
    #[must_use]
    pub fn checks(&self) -> Vec<Check> {
        Check::ORDERED
            .into_iter()
            .filter(|check| *check != Check::Signature || self.config.verify_signature)
            .collect()
    }

    /// Run every check against `ctx`, stopping at the first failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use http::HeaderMap;
    /// use medscribe_auth::body::SignableBody;
    /// use medscribe_auth::error::ErrorCode;
    /// use medscribe_auth::store::{FixedWindowRateLimiter, MemoryNonceStore};
    /// use medscribe_auth::verifier::{RequestContext, Verifier};
    /// use medscribe_core::GuardConfig;
    ///
    /// let config = GuardConfig {
    ///     verify_signature: false,
    ///     ..GuardConfig::default()
    /// };
    /// let verifier = Verifier::new(
    ///     config,
    ///     Arc::new(MemoryNonceStore::new(300_000)),
    ///     Arc::new(FixedWindowRateLimiter::new(60_000, 100)),
    /// );
    ///
    /// let headers = HeaderMap::new();
    /// let ctx = RequestContext {
    ///     method: "GET",
    ///     path_and_query: "/reports",
    ///     headers: &headers,
    ///     body: &SignableBody::Empty,
    ///     peer: None,
    /// };
    /// let err = tokio_test::block_on(verifier.verify(&ctx)).unwrap_err();
    /// assert_eq!(err.code(), ErrorCode::MissingApiKey);
    /// ```
    pub async fn verify(&self, ctx: &RequestContext<'_>) -> Result<VerifiedCaller, VerifyError> {
        let mut evidence = Evidence::default();

        for check in self.checks() {
            if let Err(err) = self.run(check, ctx, &mut evidence).await {
                warn!(
                    check = check.as_str(),
                    code = err.code().as_u16(),
                    api_key = ?evidence.api_key,
                    method = ctx.method,
                    path = ctx.path_and_query,
                    "request rejected: {err}"
                );
                return Err(err);
            }
            debug!(check = check.as_str(), "check passed");
        }

        evidence.into_caller()
    }

    async fn run(
        &self,
        check: Check,
        ctx: &RequestContext<'_>,
        evidence: &mut Evidence,
    ) -> Result<(), VerifyError> {
        match check {
            Check::ApiKey => {
                evidence.api_key = Some(check_api_key(ctx.headers, self.config.min_api_key_len)?);
            }
            Check::UserAgent => {
                evidence.agent = Some(check_user_agent(ctx.headers)?);
            }
            Check::Timestamp => {
                let now = self.clock.now_millis();
                evidence.timestamp_ms =
                    Some(check_timestamp(ctx.headers, now, self.config.max_skew_ms)?);
            }
            Check::Path => check_path(ctx.headers, ctx.path_and_query)?,
            Check::Signature => {
                let Some(secret) = self.config.signing_secret.as_deref() else {
                    error!("signature verification enabled without a signing secret");
                    return Err(VerifyError::InvalidSignature);
                };
                check_signature(ctx, secret.as_bytes())?;
            }
            Check::Nonce => {
                evidence.nonce = self.check_nonce(ctx.headers).await?;
            }
            Check::RateLimit => {
                let key = RateKey::resolve(evidence.api_key.as_ref(), ctx.peer);
                evidence.rate_remaining = self.check_rate_limit(&key).await?;
            }
        }
        Ok(())
    }

    async fn check_nonce(&self, headers: &HeaderMap) -> Result<Option<String>, VerifyError> {
        let Some(nonce) = header_str(headers, headers::NONCE).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };

        match self
            .guarded("nonce store", self.nonces.check_and_consume(nonce))
            .await?
        {
            Some(false) => Err(VerifyError::ReplayNonce),
            Some(true) | None => Ok(Some(nonce.to_owned())),
        }
    }

    async fn check_rate_limit(&self, key: &RateKey) -> Result<Option<u32>, VerifyError> {
        match self.guarded("rate limiter", self.limiter.hit(key)).await? {
            Some(RateDecision::Allowed { remaining }) => Ok(Some(remaining)),
            Some(RateDecision::Limited { retry_after_ms }) => {
                Err(VerifyError::RateLimited { retry_after_ms })
            }
            None => Ok(None),
        }
    }

    /// Await a store call under the configured timeout.
    ///
    /// Returns `Ok(None)` when the call failed and the policy is fail-open.
    async fn guarded<T>(
        &self,
        dependency: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<Option<T>, VerifyError> {
        let limit = self.config.store_timeout();
        let outcome = tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(StoreError::Timeout(limit)));

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) => match self.config.store_failure_policy {
                StoreFailurePolicy::FailOpen => {
                    warn!(dependency, error = %err, "store failed, admitting request");
                    Ok(None)
                }
                StoreFailurePolicy::FailClosed => {
                    error!(dependency, error = %err, "store failed, rejecting request");
                    Err(VerifyError::UpstreamUnavailable { dependency })
                }
            },
        }
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Require an `api-key` of at least `min_len` characters.
pub fn check_api_key(headers: &HeaderMap, min_len: usize) -> Result<ApiKey, VerifyError> {
    let Some(value) = headers.get(headers::API_KEY) else {
        return Err(VerifyError::MissingApiKey);
    };
    if value.is_empty() {
        return Err(VerifyError::MissingApiKey);
    }
    let key = value
        .to_str()
        .map(ApiKey::new)
        .map_err(|_| VerifyError::InvalidApiKey { min_len })?;
    if key.char_len() < min_len {
        return Err(VerifyError::InvalidApiKey { min_len });
    }
    Ok(key)
}

/// Parse `x-client-agent`, falling back to `x-client-user-agent`.
pub fn check_user_agent(headers: &HeaderMap) -> Result<ClientAgent, VerifyError> {
    header_str(headers, headers::CLIENT_AGENT)
        .or_else(|| header_str(headers, headers::LEGACY_CLIENT_AGENT))
        .ok_or(VerifyError::BadUserAgent)?
        .trim()
        .parse()
        .map_err(|_| VerifyError::BadUserAgent)
}

/// Require `x-timestamp` to be a finite number within `max_skew_ms` of `now`.
///
/// The bound is inclusive: a timestamp exactly `max_skew_ms` away passes.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn check_timestamp(
    headers: &HeaderMap,
    now: EpochMillis,
    max_skew_ms: i64,
) -> Result<EpochMillis, VerifyError> {
    let sent: f64 = header_str(headers, headers::TIMESTAMP)
        .and_then(|v| v.trim().parse().ok())
        .filter(|v: &f64| v.is_finite())
        .ok_or(VerifyError::MissingTimestamp)?;

    if (now as f64 - sent).abs() > max_skew_ms as f64 {
        return Err(VerifyError::SkewedTimestamp { max_skew_ms });
    }
    Ok(sent as EpochMillis)
}

/// Require `x-path` to equal the request path and query exactly.
pub fn check_path(headers: &HeaderMap, path_and_query: &str) -> Result<(), VerifyError> {
    let signed = headers
        .get(headers::PATH)
        .ok_or(VerifyError::MissingPath)?;
    if signed.as_bytes() == path_and_query.as_bytes() {
        Ok(())
    } else {
        Err(VerifyError::PathMismatch)
    }
}

/// Recompute the HMAC over the request and compare it with `x-signature`.
///
/// The timestamp field is the raw `x-timestamp` text, so the server hashes
/// exactly what the signer sent.
pub fn check_signature(ctx: &RequestContext<'_>, secret: &[u8]) -> Result<(), VerifyError> {
    let presented =
        header_str(ctx.headers, headers::SIGNATURE).ok_or(VerifyError::InvalidSignature)?;
    let timestamp =
        header_str(ctx.headers, headers::TIMESTAMP).ok_or(VerifyError::MissingTimestamp)?;

    let expected =
        canonical::sign_request(secret, ctx.method, ctx.path_and_query, ctx.body, timestamp);
    if canonical::signatures_match(presented, &expected) {
        Ok(())
    } else {
        Err(VerifyError::InvalidSignature)
    }
}
