//! Call orchestration.
//!
//! [`ApiClient`] renders an [`Endpoint`], joins it to the configured base URL
//! and sends it through the circuit breaker, which in turn runs the retry
//! strategy around a single transport request:
//!
//! ```text
//! ApiClient::call
//!   └─ CircuitBreaker::call        reject while open, record outcome
//!        └─ RetryStrategy::execute  back off on retryable errors
//!             └─ Transport::execute one HTTP exchange, classified
//! ```

use std::sync::Arc;

use tracing::instrument;
use url::Url;

use crate::{
    cache::{CacheStore, MemoryStore},
    config::{ClientConfig, ConfigError},
    endpoint::Endpoint,
    error::{ApiError, ErrorKind, Result},
    reliability::{CircuitBreaker, CircuitBreakerConfig, RetryStrategy},
    transport::{HttpTransport, JsonMap, Transport},
};

mod resources;

/// Breaker service name used when none is given.
pub const DEFAULT_SERVICE: &str = "verisoul";

/// Resilient API client.
///
/// # Examples
///
/// ```rust,no_run
/// use verisoul_client::{ApiClient, ClientConfig, endpoint};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(&ClientConfig::new("sk_test"))?;
///
/// let account = client.call(&endpoint::ACCOUNT_GET, &[("account_id", "acc-123")], None).await?;
/// println!("{account:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    base_url: Url,
    retry: RetryStrategy,
    breaker: CircuitBreaker,
}

impl ApiClient<HttpTransport> {
    /// Creates a client with its own in-memory breaker store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> std::result::Result<Self, ConfigError> {
        Self::with_store(config, DEFAULT_SERVICE, Arc::new(MemoryStore::new()))
    }

    /// Creates a client whose breaker state lives in `store` under `service`.
    ///
    /// Clients built with the same store and service share one circuit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn with_store(
        config: &ClientConfig,
        service: impl Into<String>,
        store: Arc<dyn CacheStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let transport = HttpTransport::with_config(config)?;
        let base_url = config.resolved_base_url()?;
        let retry = RetryStrategy::from_config(config);
        let breaker = CircuitBreaker::new(service, store, CircuitBreakerConfig::from_config(config));

        tracing::debug!(
            base_url = %base_url,
            service = breaker.service(),
            max_attempts = retry.max_attempts(),
            "API client created"
        );

        Ok(Self::from_parts(transport, base_url, retry, breaker))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Assembles a client from already-built parts.
    #[must_use]
    pub const fn from_parts(
        transport: T,
        base_url: Url,
        retry: RetryStrategy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self { transport, base_url, retry, breaker }
    }

    /// Base URL every endpoint is joined to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Retry strategy applied to each call.
    #[must_use]
    pub const fn retry(&self) -> &RetryStrategy {
        &self.retry
    }

    /// Circuit breaker guarding the API.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Sends one API request with retry and circuit breaking.
    ///
    /// `params` fill the endpoint's `{placeholders}`. `data` is sent as query
    /// parameters for GET/DELETE and as a JSON body for POST/PUT.
    ///
    /// # Errors
    ///
    /// - [`BadRequest`](ErrorKind::BadRequest) with status 0 if a path
    ///   parameter is missing; no request is sent
    /// - [`CircuitOpen`](ErrorKind::CircuitOpen) while the breaker is open
    /// - any transport error left after retrying, or a
    ///   [`Timeout`](ErrorKind::Timeout) if the failed call outlasted the
    ///   breaker timeout
    #[instrument(skip_all, fields(method = %endpoint.method, template = endpoint.template))]
    pub async fn call(
        &self,
        endpoint: &Endpoint,
        params: &[(&str, &str)],
        data: Option<&JsonMap>,
    ) -> Result<JsonMap> {
        let path = endpoint.render(params)?;
        let url = self.url_for(&path)?;
        let (transport, method, url) = (&self.transport, endpoint.method, &url);

        let result = self
            .breaker
            .call(|| self.retry.execute(|| transport.execute(method, url, data)))
            .await;

        if let Err(error) = &result {
            tracing::debug!(kind = %error.kind(), status = error.status(), "API call failed");
        }
        result
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
        Url::parse(&joined).map_err(|e| {
            ApiError::new(ErrorKind::BadRequest, format!("Invalid request URL: {e}"), 0, path)
                .with_source(e)
        })
    }
}
