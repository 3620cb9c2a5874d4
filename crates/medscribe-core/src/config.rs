//! Configuration for the request guard.
//!
//! All configuration is driven by environment variables prefixed with
//! `MEDSCRIBE_`. Unset variables fall back to the defaults below; set but
//! unparsable variables are a [`CoreError::InvalidValue`].

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// What the verifier does when a nonce store or rate limiter call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailurePolicy {
    /// Reject the request with `UPSTREAM_UNAVAILABLE`.
    #[default]
    FailClosed,
    /// Treat the check as passed and log a warning.
    FailOpen,
}

impl StoreFailurePolicy {
    /// The configuration spelling of this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailClosed => "fail-closed",
            Self::FailOpen => "fail-open",
        }
    }
}

impl FromStr for StoreFailurePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            "fail-open" | "open" => Ok(Self::FailOpen),
            _ => Err(CoreError::InvalidValue {
                key: "MEDSCRIBE_STORE_FAILURE_POLICY".to_owned(),
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification policy and limits.
#[derive(Clone)]
pub struct GuardConfig {
    /// Shared HMAC secret used to sign and verify requests.
    pub signing_secret: Option<String>,
    /// Largest accepted distance between `x-timestamp` and server time.
    pub max_skew_ms: i64,
    /// Length of one fixed rate-limit window.
    pub rate_limit_window_ms: i64,
    /// Requests admitted per key per window.
    pub rate_limit_max: u32,
    /// Minimum accepted `api-key` length in characters.
    pub min_api_key_len: usize,
    /// Whether the HMAC signature step runs.
    pub verify_signature: bool,
    /// Outcome of a check whose backing store failed.
    pub store_failure_policy: StoreFailurePolicy,
    /// Upper bound on a single nonce store or rate limiter call.
    pub store_timeout_ms: u64,
    /// How often the host purges expired nonce and bucket entries.
    pub sweep_interval_ms: u64,
}

impl fmt::Debug for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("max_skew_ms", &self.max_skew_ms)
            .field("rate_limit_window_ms", &self.rate_limit_window_ms)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("min_api_key_len", &self.min_api_key_len)
            .field("verify_signature", &self.verify_signature)
            .field("store_failure_policy", &self.store_failure_policy)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("sweep_interval_ms", &self.sweep_interval_ms)
            .finish()
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            max_skew_ms: 5 * 60 * 1000,
            rate_limit_window_ms: 60 * 1000,
            rate_limit_max: 100,
            min_api_key_len: 20,
            verify_signature: true,
            store_failure_policy: StoreFailurePolicy::FailClosed,
            store_timeout_ms: 250,
            sweep_interval_ms: 60 * 1000,
        }
    }
}

impl GuardConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("MEDSCRIBE_SIGNING_SECRET").filter(|v| !v.is_empty()) {
            config.signing_secret = Some(v);
        }
        if let Some(v) = lookup("MEDSCRIBE_MAX_SKEW_MS") {
            config.max_skew_ms = parse_var("MEDSCRIBE_MAX_SKEW_MS", &v)?;
        }
        if let Some(v) = lookup("MEDSCRIBE_RATE_LIMIT_WINDOW_MS") {
            config.rate_limit_window_ms = parse_var("MEDSCRIBE_RATE_LIMIT_WINDOW_MS", &v)?;
        }
        if let Some(v) = lookup("MEDSCRIBE_RATE_LIMIT_MAX") {
            config.rate_limit_max = parse_var("MEDSCRIBE_RATE_LIMIT_MAX", &v)?;
        }
        if let Some(v) = lookup("MEDSCRIBE_MIN_API_KEY_LEN") {
            config.min_api_key_len = parse_var("MEDSCRIBE_MIN_API_KEY_LEN", &v)?;
        }
        if let Some(v) = lookup("MEDSCRIBE_VERIFY_SIGNATURE") {
            config.verify_signature = parse_bool("MEDSCRIBE_VERIFY_SIGNATURE", &v)?;
        }
        if let Some(v) = lookup("MEDSCRIBE_STORE_FAILURE_POLICY") {
            config.store_failure_policy = v.parse()?;
        }
        if let Some(v) = lookup("MEDSCRIBE_STORE_TIMEOUT_MS") {
            config.store_timeout_ms = parse_var("MEDSCRIBE_STORE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("MEDSCRIBE_SWEEP_INTERVAL_MS") {
            config.sweep_interval_ms = parse_var("MEDSCRIBE_SWEEP_INTERVAL_MS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the limits are usable together.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_skew_ms <= 0 {
            return Err(CoreError::Config("max skew must be positive".to_owned()));
        }
        if self.rate_limit_window_ms <= 0 {
            return Err(CoreError::Config(
                "rate limit window must be positive".to_owned(),
            ));
        }
        if self.rate_limit_max == 0 {
            return Err(CoreError::Config(
                "rate limit ceiling must be at least 1".to_owned(),
            ));
        }
        if self.verify_signature && self.signing_secret.is_none() {
            return Err(CoreError::Config(
                "MEDSCRIBE_SIGNING_SECRET is required while signature verification is enabled"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// [`store_timeout_ms`](Self::store_timeout_ms) as a `Duration`.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// How long a consumed nonce must be remembered.
    ///
    /// A request stamped up to `max_skew_ms` ahead of the server clock stays
    /// fresh for another `max_skew_ms` after that, so a nonce first seen at
    /// `now` can still be replayed fresh at `now + 2 * max_skew_ms` inclusive.
    #[must_use]
    pub fn nonce_ttl_ms(&self) -> i64 {
        self.max_skew_ms.saturating_mul(2).saturating_add(1)
    }

    /// [`sweep_interval_ms`](Self::sweep_interval_ms) as a `Duration`.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> CoreResult<T> {
    value.trim().parse().map_err(|_| CoreError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_bool(key: &str, value: &str) -> CoreResult<bool> {
    match value.trim() {
        "1" | "true" | "yes" | "TRUE" | "YES" => Ok(true),
        "0" | "false" | "no" | "FALSE" | "NO" => Ok(false),
        _ => Err(CoreError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}
