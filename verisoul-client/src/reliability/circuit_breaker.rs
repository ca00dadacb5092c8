//! Circuit breaker backed by a shared [`CacheStore`].
//!
//! The breaker holds no state of its own. Its state, failure count and last
//! failure time live in the injected store under keys namespaced by service
//! name, so every client sharing a store sees the same circuit.
//!
//! # State Transitions
//!
//! ```text
//! Closed ──[failure_count >= failure_threshold]──> Open
//!   ▲                                               │
//!   │                                               │ [recovery_time since last failure]
//!   │                                               ▼
//!   └──────────────[success]──────────────────── HalfOpen
//!                  [failure] ──────────────────────> Open
//! ```
//!
//! A failure that also took at least `timeout` is reported as a timeout.
//! Slow successes are recorded as plain successes.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use verisoul_client::{
//!     cache::MemoryStore,
//!     reliability::{CircuitBreaker, CircuitBreakerConfig, CircuitState},
//! };
//!
//! # async fn example() -> verisoul_client::Result<()> {
//! let breaker = CircuitBreaker::new(
//!     "verisoul",
//!     Arc::new(MemoryStore::new()),
//!     CircuitBreakerConfig::default(),
//! );
//!
//! let value = breaker.call(|| async { Ok("success") }).await?;
//!
//! assert_eq!(value, "success");
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde_json::{Value, json};
use tokio::time::Instant;

use crate::{
    cache::CacheStore,
    config::ClientConfig,
    error::{ApiError, ErrorKind, Result},
};

/// Lifetime of the failure count and last failure timestamp.
pub const FAILURE_TTL: Duration = Duration::from_secs(600);

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Normal operation, calls flow through.
    #[default]
    Closed,

    /// Too many failures, calls are rejected without running.
    Open,

    /// Recovery window elapsed; the next call probes the service.
    HalfOpen,
}

impl CircuitState {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "closed" => Some(Self::Closed),
            "open" => Some(Self::Open),
            "half_open" => Some(Self::HalfOpen),
            _ => None,
        }
    }

    /// State after a call made in `self` succeeded.
    #[must_use]
    pub const fn after_success(self) -> Self {
        match self {
            Self::Closed | Self::HalfOpen => Self::Closed,
            Self::Open => Self::Open,
        }
    }

    /// State after a call made in `self` failed, with `failures` recorded so
    /// far including this one.
    #[must_use]
    pub const fn after_failure(self, failures: u64, threshold: u64) -> Self {
        match self {
            Self::Closed if failures < threshold => Self::Closed,
            Self::Closed | Self::Open | Self::HalfOpen => Self::Open,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for circuit breaker.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use verisoul_client::reliability::CircuitBreakerConfig;
///
/// let strict = CircuitBreakerConfig {
///     failure_threshold: 2,
///     timeout: Duration::from_secs(5),
///     recovery_time: Duration::from_secs(600),
/// };
///
/// let default = CircuitBreakerConfig::default();
/// assert_eq!(default.failure_threshold, 5);
/// assert!(strict.recovery_time > default.recovery_time);
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures that open the circuit.
    ///
    /// Default: 5
    pub failure_threshold: u64,

    /// A failed call lasting at least this long is reported as a timeout.
    ///
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Time after the last failure before an open circuit lets a probe through.
    /// Also the lifetime of the stored state.
    ///
    /// Default: 300 seconds
    pub recovery_time: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            recovery_time: Duration::from_secs(300),
        }
    }
}

impl CircuitBreakerConfig {
    /// Builds the breaker settings of a client config.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            timeout: config.breaker_timeout(),
            recovery_time: config.breaker_recovery_time(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoreKeys {
    state: String,
    failures: String,
    last_failure: String,
}

impl StoreKeys {
    fn new(service: &str) -> Self {
        Self {
            state: format!("circuit_breaker:{service}:state"),
            failures: format!("circuit_breaker:{service}:failures"),
            last_failure: format!("circuit_breaker:{service}:last_failure"),
        }
    }
}

/// Circuit breaker guarding one remote service.
///
/// # Store failures
///
/// The store never fails a request. Unreadable values fall back to their
/// defaults (closed, zero failures, no last failure) and failed writes are
/// logged and skipped.
///
/// # Concurrency
///
/// The state is read, acted on and written back without a lock. Concurrent
/// calls may both pass a half-open check or both record a failure from the
/// same count; the circuit still converges on the next call.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    service: String,
    store: Arc<dyn CacheStore>,
    config: CircuitBreakerConfig,
    keys: StoreKeys,
}

impl CircuitBreaker {
    /// Creates a breaker for `service`, keeping its state in `store`.
    ///
    /// A `failure_threshold` of 0 is raised to 1.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        store: Arc<dyn CacheStore>,
        mut config: CircuitBreakerConfig,
    ) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        let service = service.into();
        let keys = StoreKeys::new(&service);
        Self { service, store, config, keys }
    }

    /// Service name used to namespace the stored state.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Breaker settings.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as recorded in the store.
    ///
    /// The stored state expires after `recovery_time`. While the failure
    /// count is still at or above the threshold the circuit is reported as
    /// open, so the next call goes through the recovery check.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let stored =
            self.read(&self.keys.state).as_ref().and_then(Value::as_str).and_then(CircuitState::parse);

        match stored {
            Some(state) => state,
            None if self.failure_count() >= self.config.failure_threshold => CircuitState::Open,
            None => CircuitState::Closed,
        }
    }

    /// Failures recorded within the last [`FAILURE_TTL`].
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.read(&self.keys.failures).as_ref().and_then(Value::as_u64).unwrap_or(0)
    }

    /// Clears every stored key, closing the circuit.
    pub fn reset(&self) {
        self.clear();
        tracing::info!(service = %self.service, "Circuit breaker reset");
    }

    /// Executes an operation through the circuit breaker.
    ///
    /// 1. **Open**: if `recovery_time` has passed since the last failure (or
    ///    none is recorded) move to half-open, otherwise reject
    /// 2. **Closed or half-open**: run the operation and time it
    /// 3. **Success**: half-open closes; closed forgives one failure
    /// 4. **Failure**: record it, possibly opening the circuit
    ///
    /// # Errors
    ///
    /// Returns a [`CircuitOpen`](ErrorKind::CircuitOpen) error without running
    /// `operation` while the circuit is open. Otherwise returns the error of
    /// `operation`, replaced by a [`Timeout`](ErrorKind::Timeout) error (with
    /// the original as source) when the failed call took at least `timeout`.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = self.state();

        if state == CircuitState::Open {
            if self.recovery_elapsed() {
                self.transition_to_half_open();
                state = CircuitState::HalfOpen;
            } else {
                tracing::debug!(service = %self.service, "Circuit breaker open, rejecting call");
                return Err(ApiError::circuit_open(&self.service));
            }
        }

        let started = Instant::now();
        let result = operation().await;
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                self.record_success(state);
                Ok(value)
            }
            Err(error) => {
                let error = if elapsed >= self.config.timeout && error.kind() != ErrorKind::Timeout {
                    tracing::debug!(
                        service = %self.service,
                        elapsed_ms = elapsed.as_millis(),
                        "Failed call exceeded breaker timeout"
                    );
                    ApiError::timeout(error.endpoint().to_owned(), self.config.timeout).with_source(error)
                } else {
                    error
                };
                self.record_failure(state);
                Err(error)
            }
        }
    }

    fn record_success(&self, state: CircuitState) {
        match state.after_success() {
            CircuitState::Closed if state == CircuitState::HalfOpen => self.transition_to_closed(),
            CircuitState::Closed => match self.failure_count() {
                0 => {}
                1 => self.remove(&self.keys.failures),
                count => self.write(&self.keys.failures, json!(count - 1), Some(FAILURE_TTL)),
            },
            CircuitState::Open | CircuitState::HalfOpen => {}
        }
    }

    fn record_failure(&self, state: CircuitState) {
        let failures = self.failure_count().saturating_add(1);
        self.write(&self.keys.failures, json!(failures), Some(FAILURE_TTL));
        self.write(&self.keys.last_failure, json!(now_millis()), Some(FAILURE_TTL));

        if state.after_failure(failures, self.config.failure_threshold) == CircuitState::Open {
            self.transition_to_open(failures);
        } else {
            tracing::debug!(service = %self.service, failures, "Circuit breaker recorded failure");
        }
    }

    fn recovery_elapsed(&self) -> bool {
        let Some(last_failure) = self.read(&self.keys.last_failure).as_ref().and_then(Value::as_u64)
        else {
            return true;
        };

        let recovery_ms = u64::try_from(self.config.recovery_time.as_millis()).unwrap_or(u64::MAX);
        now_millis().saturating_sub(last_failure) >= recovery_ms
    }

    fn transition_to_open(&self, failures: u64) {
        self.write(&self.keys.state, json!(CircuitState::Open.as_str()), Some(self.config.recovery_time));
        tracing::warn!(
            service = %self.service,
            failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker opened due to failures"
        );
    }

    fn transition_to_half_open(&self) {
        self.write(&self.keys.state, json!(CircuitState::HalfOpen.as_str()), Some(self.config.recovery_time));
        tracing::info!(service = %self.service, "Circuit breaker half-open, testing recovery");
    }

    fn transition_to_closed(&self) {
        self.clear();
        tracing::info!(service = %self.service, "Circuit breaker closed, normal operation resumed");
    }

    fn clear(&self) {
        self.remove(&self.keys.state);
        self.remove(&self.keys.failures);
        self.remove(&self.keys.last_failure);
    }

    fn read(&self, key: &str) -> Option<Value> {
        self.store.get(key).unwrap_or_else(|e| {
            tracing::warn!(service = %self.service, key, error = %e, "Circuit breaker store read failed");
            None
        })
    }

    fn write(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if let Err(e) = self.store.set(key, value, ttl) {
            tracing::warn!(service = %self.service, key, error = %e, "Circuit breaker store write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            tracing::warn!(service = %self.service, key, error = %e, "Circuit breaker store delete failed");
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
