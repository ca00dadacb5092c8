//! In-process [`CacheStore`] backed by a concurrent map.

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use serde_json::Value;
use tokio::time::Instant;

use super::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Thread-safe in-memory store.
///
/// Cloning is cheap and clones share the same entries, so one `MemoryStore`
/// can back any number of circuit breakers.
///
/// Expiry uses [`tokio::time::Instant`], which follows the paused clock in
/// tests built with `tokio::time::pause`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|entry| !entry.value().is_expired(now)).count()
    }

    /// Returns `true` if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Removes `key` if it has expired; returns the live entry otherwise.
    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired(Instant::now()) {
                    occupied.remove();
                    None
                } else {
                    Some(occupied.get().clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.live_entry(key).map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool, CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_owned(), CacheEntry { value, expires_at });
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self.entries.remove(key).is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live_entry(key).is_some())
    }
}
