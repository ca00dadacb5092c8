//! Key-value storage with per-key expiry.
//!
//! The circuit breaker keeps its state in a [`CacheStore`] instead of in the
//! breaker itself, so several clients (or several breakers) can share one
//! store and observe the same service health. Stores are injected as
//! `Arc<dyn CacheStore>`; [`MemoryStore`] is the in-process implementation.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use verisoul_client::cache::{CacheStore, MemoryStore};
//!
//! # fn example() -> Result<(), verisoul_client::cache::CacheError> {
//! let store = MemoryStore::new();
//! store.set("greeting", json!("hello"), Some(Duration::from_secs(60)))?;
//!
//! assert!(store.has("greeting")?);
//! assert_eq!(store.get_or("missing", json!(0))?, json!(0));
//! # Ok(())
//! # }
//! ```

use std::{fmt, time::Duration};

use serde_json::Value;
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// Error raised by a [`CacheStore`] whose backing medium is unavailable.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached or refused the operation.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Minimal key-value store with optional per-key TTL.
///
/// Expired entries must be invisible to [`get`](Self::get) and
/// [`has`](Self::has). Implementations may purge them lazily.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Returns the live value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store is unavailable.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Stores `value` under `key`, expiring after `ttl` when given.
    ///
    /// Returns `true` when the value was stored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store is unavailable.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool, CacheError>;

    /// Removes `key`, returning `true` if a live entry was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store is unavailable.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Checks whether a live entry exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store is unavailable.
    fn has(&self, key: &str) -> Result<bool, CacheError>;

    /// Returns the live value under `key`, or `default` when missing or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store is unavailable.
    fn get_or(&self, key: &str, default: Value) -> Result<Value, CacheError> {
        Ok(self.get(key)?.unwrap_or(default))
    }
}
