//! Reliability patterns for API calls.
//!
//! Provides retry with exponential backoff and a store-backed circuit breaker
//! for handling transient failures of the remote API.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, FAILURE_TTL};
pub use retry::RetryStrategy;
