//! Nonce and rate-limit stores.
//!
//! The verifier owns neither store: both are injected behind [`NonceStore`]
//! and [`RateLimiter`] so a single-instance deployment can use the in-memory
//! implementations here and a multi-instance deployment can swap in a
//! networked backend without touching the check pipeline.
//!
//! # Object safety
//!
//! Both traits use `#[async_trait]` so they can be held as `Arc<dyn ...>`.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use medscribe_core::{Clock, EpochMillis, Expiring, ExpiringStore, RateKey, SystemClock};
use tracing::debug;

use crate::error::StoreError;

/// Single-use nonce tracking.
#[async_trait]
pub trait NonceStore: Send + Sync + Debug {
    /// Record `nonce` as used.
    ///
    /// Returns `true` on first use and `false` if the nonce was already seen
    /// within the retention period.
    async fn check_and_consume(&self, nonce: &str) -> Result<bool, StoreError>;
}

/// Outcome of counting one request against a caller's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Admitted; `remaining` more requests fit in the current window.
    Allowed {
        /// Requests left before the ceiling.
        remaining: u32,
    },
    /// Rejected until the window resets.
    Limited {
        /// Milliseconds until the window resets.
        retry_after_ms: i64,
    },
}

impl RateDecision {
    /// Whether the request was admitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Per-caller request counting.
#[async_trait]
pub trait RateLimiter: Send + Sync + Debug {
    /// Count one request for `key` and decide whether it is admitted.
    async fn hit(&self, key: &RateKey) -> Result<RateDecision, StoreError>;
}

/// In-process nonce store.
///
/// A nonce is remembered for `ttl_ms` after first use. The freshness check
/// accepts timestamps up to the skew bound on either side of the server clock,
/// so a request dated at the far future edge stays fresh for twice the skew
/// after it is first seen; `ttl_ms` must cover that (see
/// `GuardConfig::nonce_ttl_ms`).
#[derive(Debug)]
pub struct MemoryNonceStore {
    seen: ExpiringStore<()>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl MemoryNonceStore {
    /// Create a store retaining nonces for `ttl_ms`.
    #[must_use]
    pub fn new(ttl_ms: i64) -> Self {
        Self::with_clock(ttl_ms, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            seen: ExpiringStore::new(),
            ttl_ms,
            clock,
        }
    }

    /// Forget nonces whose retention has elapsed.
    pub fn purge_expired(&self) -> usize {
        self.seen.purge_expired(self.clock.now_millis())
    }

    /// Number of retained nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no nonces are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn check_and_consume(&self, nonce: &str) -> Result<bool, StoreError> {
        let now = self.clock.now_millis();
        let expires_at = now.saturating_add(self.ttl_ms);
        let first_use = self
            .seen
            .upsert(nonce, now, || (Expiring::new((), expires_at), true), |_| false);
        debug!(first_use, "checked nonce");
        Ok(first_use)
    }
}

/// In-process fixed-window rate limiter.
///
/// Each key gets a counter and a reset deadline. The first request of a window
/// sets the counter to 1 and the deadline to `now + window`; later requests
/// increment while under the ceiling and are rejected at or above it. Once the
/// deadline passes the next request opens a new window.
///
/// Counters are updated under the key's shard lock, so concurrent requests for
/// one key are counted exactly.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    buckets: ExpiringStore<u32>,
    window_ms: i64,
    max_requests: u32,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    /// Create a limiter admitting `max_requests` per `window_ms` per key.
    #[must_use]
    pub fn new(window_ms: i64, max_requests: u32) -> Self {
        Self::with_clock(window_ms, max_requests, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    #[must_use]
    pub fn with_clock(window_ms: i64, max_requests: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: ExpiringStore::new(),
            window_ms,
            max_requests,
            clock,
        }
    }

    /// Count a request at an explicit time.
    pub fn hit_at(&self, key: &RateKey, now: EpochMillis) -> RateDecision {
        let max = self.max_requests;
        let reset_at = now.saturating_add(self.window_ms);
        self.buckets.upsert(
            &key.storage_key(),
            now,
            || {
                (
                    Expiring::new(1, reset_at),
                    RateDecision::Allowed {
                        remaining: max.saturating_sub(1),
                    },
                )
            },
            |bucket| {
                if bucket.value < max {
                    bucket.value += 1;
                    RateDecision::Allowed {
                        remaining: max - bucket.value,
                    }
                } else {
                    RateDecision::Limited {
                        retry_after_ms: bucket.expires_at - now,
                    }
                }
            },
        )
    }

    /// Drop buckets whose window has ended.
    pub fn purge_expired(&self) -> usize {
        self.buckets.purge_expired(self.clock.now_millis())
    }

    /// Number of tracked buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no buckets are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn hit(&self, key: &RateKey) -> Result<RateDecision, StoreError> {
        let decision = self.hit_at(key, self.clock.now_millis());
        debug!(%key, ?decision, "counted request");
        Ok(decision)
    }
}
