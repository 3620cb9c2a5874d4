//! Concurrent keyed state with per-entry deadlines.
//!
//! Provides [`ExpiringStore`], the backing map for both the nonce cache and the
//! fixed-window rate limiter. Each entry carries an `expires_at` deadline; an
//! entry whose deadline has passed is treated as absent by every operation and
//! is dropped by [`ExpiringStore::purge_expired`].

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::types::EpochMillis;

/// A value paired with the time it stops being live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiring<V> {
    /// The stored value.
    pub value: V,
    /// Epoch milliseconds at which the entry expires.
    pub expires_at: EpochMillis,
}

impl<V> Expiring<V> {
    /// Pair a value with its deadline.
    pub fn new(value: V, expires_at: EpochMillis) -> Self {
        Self { value, expires_at }
    }

    /// Whether the entry is dead at `now`. The deadline itself counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: EpochMillis) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe map of string keys to [`Expiring`] values.
///
/// All mutation of a single key happens under that key's shard lock, so a
/// read-modify-write in [`upsert`](ExpiringStore::upsert) is atomic with
/// respect to concurrent callers using the same key.
///
/// # Examples
///
/// ```
/// use medscribe_core::{Expiring, ExpiringStore};
///
/// let store = ExpiringStore::<u32>::new();
/// let first = store.upsert("k", 0, || (Expiring::new(1, 100), true), |_| false);
/// let second = store.upsert("k", 50, || (Expiring::new(1, 150), true), |_| false);
/// assert!(first);
/// assert!(!second);
/// ```
#[derive(Debug)]
pub struct ExpiringStore<V: Send + Sync> {
    inner: DashMap<String, Expiring<V>>,
}

impl<V: Send + Sync> ExpiringStore<V> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Insert or update the entry for `key` atomically.
    ///
    /// When no live entry exists (absent, or expired at `now`), `fresh` builds
    /// the replacement entry and the result. Otherwise `live` mutates the
    /// existing entry in place and produces the result.
    pub fn upsert<R>(
        &self,
        key: &str,
        now: EpochMillis,
        fresh: impl FnOnce() -> (Expiring<V>, R),
        live: impl FnOnce(&mut Expiring<V>) -> R,
    ) -> R {
        match self.inner.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    let (entry, result) = fresh();
                    occupied.insert(entry);
                    result
                } else {
                    live(occupied.get_mut())
                }
            }
            Entry::Vacant(vacant) => {
                let (entry, result) = fresh();
                vacant.insert(entry);
                result
            }
        }
    }

    /// Drop every entry that has expired at `now`, returning how many were removed.
    pub fn purge_expired(&self, now: EpochMillis) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.inner.len())
    }

    /// Number of stored entries, live or not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V: Send + Sync> Default for ExpiringStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
