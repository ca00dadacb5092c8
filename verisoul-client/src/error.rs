//! Error types for the Verisoul client.
//!
//! Every failure surfaced by an API call is an [`ApiError`] tagged with an
//! [`ErrorKind`]. The kind drives the retry and circuit breaker decisions, while
//! the attached status code, endpoint and raw response body are kept for
//! logging and caller-side branching.
//!
//! # Error Categories
//!
//! - **Transient** ([`ErrorKind::Connection`], [`ErrorKind::Timeout`],
//!   [`ErrorKind::ServerError`] with a 5xx status, [`ErrorKind::RateLimited`]): retried
//! - **Client errors** ([`ErrorKind::BadRequest`], [`ErrorKind::Authentication`],
//!   [`ErrorKind::NotFound`], [`ErrorKind::Validation`]): never retried
//! - **Protocol errors** ([`ErrorKind::InvalidResponse`], [`ErrorKind::BusinessLogic`]):
//!   the API answered, but not with a usable success body
//! - **Load shedding** ([`ErrorKind::CircuitOpen`]): the request was never sent
//!
//! # Examples
//!
//! ```
//! use verisoul_client::error::{ApiError, ErrorKind};
//!
//! let error = ApiError::rate_limited("/session/authenticate", None);
//! assert_eq!(error.kind(), ErrorKind::RateLimited);
//! assert_eq!(error.status(), 429);
//! assert!(error.is_retryable());
//! ```

use std::{error::Error as StdError, fmt, time::Duration};

use thiserror::Error;

/// Result type alias for API operations.
///
/// All fallible API calls in this crate return this type.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Boxed underlying cause attached to an [`ApiError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of an API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be completed (DNS, refused connection, broken body).
    Connection,
    /// The request exceeded its deadline.
    Timeout,
    /// HTTP 401.
    Authentication,
    /// HTTP 400.
    BadRequest,
    /// HTTP 404.
    NotFound,
    /// HTTP 422, field-level validation failure.
    Validation,
    /// HTTP 429.
    RateLimited,
    /// Any other non-success status, including 5xx.
    ServerError,
    /// Success status with a body that is not a JSON object.
    InvalidResponse,
    /// Success status whose body reports an application-level failure.
    BusinessLogic,
    /// Rejected locally by an open circuit breaker.
    CircuitOpen,
}

impl ErrorKind {
    /// Returns a short, stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::BusinessLogic => "business_logic",
            Self::CircuitOpen => "circuit_open",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified API failure.
///
/// Construct through the per-kind helpers ([`ApiError::connection`],
/// [`ApiError::validation`], ...) so the message, status code and kind stay
/// consistent.
///
/// This type implements `#[must_use]` to ensure errors are not silently ignored.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    status: u16,
    endpoint: String,
    body: Option<String>,
    #[source]
    source: Option<BoxError>,
}

impl ApiError {
    /// Creates an error with every field given explicitly.
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        status: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            endpoint: endpoint.into(),
            body: None,
            source: None,
        }
    }

    /// Attaches the raw response body.
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The request never completed.
    pub fn connection(endpoint: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        Self::new(ErrorKind::Connection, format!("Failed to connect to API: {cause}"), 0, endpoint)
            .with_source(cause)
    }

    /// The request failed for a reason other than connecting, e.g. the body
    /// could not be read.
    pub fn request_failed(endpoint: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        Self::new(ErrorKind::Connection, format!("Could not complete request: {cause}"), 0, endpoint)
            .with_source(cause)
    }

    /// The request did not finish within `after`.
    ///
    /// Whole seconds are reported as `30s`, anything else in milliseconds.
    pub fn timeout(endpoint: impl Into<String>, after: Duration) -> Self {
        let after = if after.subsec_nanos() == 0 && after >= Duration::from_secs(1) {
            format!("{}s", after.as_secs())
        } else {
            format!("{}ms", after.as_millis())
        };
        Self::new(ErrorKind::Timeout, format!("Connection to API timed out after {after}"), 504, endpoint)
    }

    /// HTTP 401.
    pub fn authentication(endpoint: impl Into<String>, body: Option<String>) -> Self {
        Self::new(ErrorKind::Authentication, "Authentication failed: invalid API key", 401, endpoint)
            .with_body(body)
    }

    /// HTTP 400 with the message reported by the API.
    pub fn bad_request(
        endpoint: impl Into<String>,
        message: Option<String>,
        body: Option<String>,
    ) -> Self {
        let message = message.unwrap_or_else(|| "Bad request".to_owned());
        Self::new(ErrorKind::BadRequest, format!("Bad request: {message}"), 400, endpoint)
            .with_body(body)
    }

    /// HTTP 404.
    pub fn not_found(endpoint: impl Into<String>, body: Option<String>) -> Self {
        let endpoint = endpoint.into();
        Self::new(ErrorKind::NotFound, format!("Resource not found: {endpoint}"), 404, endpoint)
            .with_body(body)
    }

    /// HTTP 422 with the validation message reported by the API.
    pub fn validation(
        endpoint: impl Into<String>,
        message: Option<String>,
        body: Option<String>,
    ) -> Self {
        let message = message.unwrap_or_else(|| "request validation failed".to_owned());
        Self::new(ErrorKind::Validation, format!("Validation error: {message}"), 422, endpoint)
            .with_body(body)
    }

    /// HTTP 429.
    pub fn rate_limited(endpoint: impl Into<String>, body: Option<String>) -> Self {
        Self::new(ErrorKind::RateLimited, "Rate limit exceeded for API", 429, endpoint)
            .with_body(body)
    }

    /// Any status not covered by a dedicated kind.
    pub fn server(endpoint: impl Into<String>, status: u16, body: Option<String>) -> Self {
        Self::new(ErrorKind::ServerError, format!("API server error (status {status})"), status, endpoint)
            .with_body(body)
    }

    /// A success status whose body cannot be used.
    pub fn invalid_response(
        endpoint: impl Into<String>,
        status: u16,
        reason: impl fmt::Display,
        body: Option<String>,
    ) -> Self {
        Self::new(ErrorKind::InvalidResponse, format!("Invalid API response: {reason}"), status, endpoint)
            .with_body(body)
    }

    /// A success status whose body reports a failure.
    pub fn business_logic(
        endpoint: impl Into<String>,
        message: impl fmt::Display,
        body: Option<String>,
    ) -> Self {
        Self::new(ErrorKind::BusinessLogic, format!("API returned an error: {message}"), 200, endpoint)
            .with_body(body)
    }

    /// Rejected by the circuit breaker guarding `service`.
    pub fn circuit_open(service: impl Into<String>) -> Self {
        let service = service.into();
        Self::new(
            ErrorKind::CircuitOpen,
            format!("Circuit breaker is open for service '{service}'"),
            503,
            service,
        )
    }

    /// The failure classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code, or 0 when no response was received.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Endpoint (or breaker service) the error belongs to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Raw response body, when one was received.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Whether the retry strategy may attempt the operation again.
    ///
    /// Connection failures, timeouts, 429, 408 and 5xx are retryable. Every
    /// other 4xx, validation failures, malformed or failing success bodies and
    /// open circuits are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::RateLimited => true,
            ErrorKind::ServerError => self.status == 408 || self.status >= 500,
            ErrorKind::Authentication
            | ErrorKind::BadRequest
            | ErrorKind::NotFound
            | ErrorKind::Validation
            | ErrorKind::InvalidResponse
            | ErrorKind::BusinessLogic
            | ErrorKind::CircuitOpen => false,
        }
    }
}
