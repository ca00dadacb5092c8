//! Verisoul Client: Resilient Access to the Verisoul Identity API
//!
//! An async Rust client for the Verisoul identity-verification REST API
//! (accounts, sessions, phone checks, liveness and list management). Every
//! call goes through a retry strategy and a circuit breaker, and every
//! response is classified into a typed [`ApiError`] before it reaches you.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Application   │
//! └────────┬────────┘
//!          │ ApiClient::call(endpoint, params, data)
//! ┌────────▼────────────────────────────────────────┐
//! │            verisoul-client (this crate)          │
//! │  ┌────────────────┐    ┌─────────────────────┐  │
//! │  │ CircuitBreaker │───▶│ state in CacheStore │  │
//! │  └───────┬────────┘    └─────────────────────┘  │
//! │  ┌───────▼────────┐                             │
//! │  │ RetryStrategy  │  exponential backoff        │
//! │  └───────┬────────┘                             │
//! │  ┌───────▼────────┐                             │
//! │  │ HttpTransport  │  classify status and body   │
//! │  └───────┬────────┘                             │
//! └──────────┼──────────────────────────────────────┘
//!            │ HTTPS + x-api-key
//! ┌──────────▼──────┐
//! │  Verisoul API   │
//! └─────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use verisoul_client::{ApiClient, ClientConfig, ErrorKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(&ClientConfig::new("sk_test_..."))?;
//!
//! match client.get_account("acc-123").await {
//!     Ok(account) => println!("{account:?}"),
//!     Err(e) if e.kind() == ErrorKind::NotFound => println!("no such account"),
//!     Err(e) if e.kind() == ErrorKind::CircuitOpen => println!("API unavailable, try later"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! [`ClientConfig`] can be built in code or loaded from TOML:
//!
//! ```rust
//! use verisoul_client::ClientConfig;
//!
//! let config = ClientConfig::from_toml(
//!     r#"
//!     api_key = "sk_live_..."
//!     environment = "production"
//!     retry_attempts = 5
//!     failure_threshold = 10
//!     "#,
//! )?;
//! assert_eq!(config.retry_attempts, 5);
//! # Ok::<(), verisoul_client::config::ConfigError>(())
//! ```
//!
//! # Sharing Circuit State
//!
//! Breaker state lives in a [`CacheStore`]. Clients created with the same
//! store and service name trip and recover together:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use verisoul_client::{ApiClient, CacheStore, ClientConfig, MemoryStore};
//!
//! # fn example() -> Result<(), verisoul_client::config::ConfigError> {
//! let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
//! let config = ClientConfig::new("sk_test_...");
//!
//! let accounts = ApiClient::with_store(&config, "verisoul", Arc::clone(&store))?;
//! let lists = ApiClient::with_store(&config, "verisoul", store)?;
//! # let _ = (accounts, lists);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! | Kind | Status | Retried |
//! |------|--------|---------|
//! | `Connection` | 0 | yes |
//! | `Timeout` | 504 | yes |
//! | `RateLimited` | 429 | yes |
//! | `ServerError` | 408, 5xx | yes |
//! | `ServerError` | other | no |
//! | `BadRequest`, `Authentication`, `NotFound`, `Validation` | 400, 401, 404, 422 | no |
//! | `InvalidResponse`, `BusinessLogic` | 2xx | no |
//! | `CircuitOpen` | 503 | no |
//!
//! # Logging
//!
//! The crate emits [`tracing`] events. See [`observability::init_tracing`] for
//! a ready-made subscriber.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and wiremock"
)]

pub mod cache;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod observability;
pub mod reliability;
pub mod transport;

pub use cache::{CacheError, CacheStore, MemoryStore};
pub use client::ApiClient;
pub use config::{ClientConfig, Environment};
pub use endpoint::Endpoint;
pub use error::{ApiError, ErrorKind, Result};
pub use reliability::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryStrategy};
pub use transport::{HttpMethod, JsonMap};
