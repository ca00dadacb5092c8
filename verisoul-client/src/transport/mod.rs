//! Transport abstraction layer.
//!
//! A transport performs exactly one HTTP exchange and returns either the
//! decoded JSON object or a classified [`ApiError`](crate::error::ApiError).
//! It never retries and never caches; those concerns live in
//! [`reliability`](crate::reliability).
//!
//! # Examples
//!
//! ```rust,no_run
//! use verisoul_client::{
//!     config::ClientConfig,
//!     transport::{HttpTransport, Transport},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::with_config(&ClientConfig::new("sk_test"))?;
//!
//! let url = url::Url::parse("https://api.sandbox.verisoul.ai/list")?;
//! let lists = transport.get(&url, None).await?;
//! println!("{lists:?}");
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::fmt;

use url::Url;

use crate::error::Result;

pub mod http;
pub mod response;
mod sealed;

pub use http::HttpTransport;

/// Decoded JSON object returned by every API call.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// HTTP verbs used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`, payload sent as query parameters.
    Get,
    /// `POST`, payload sent as a JSON body.
    Post,
    /// `PUT`, payload sent as a JSON body.
    Put,
    /// `DELETE`, payload sent as query parameters.
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the payload travels in the request body.
    #[must_use]
    pub const fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-request HTTP transport.
///
/// This trait is sealed; [`HttpTransport`] is the provided implementation.
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// Executes one request.
    ///
    /// `data` is sent as query parameters for GET/DELETE and as a JSON body for
    /// POST/PUT.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ApiError`](crate::error::ApiError) for transport
    /// failures, non-success statuses and unusable success bodies.
    fn execute<'a>(
        &'a self,
        method: HttpMethod,
        url: &'a Url,
        data: Option<&'a JsonMap>,
    ) -> impl Future<Output = Result<JsonMap>> + Send + 'a;

    /// Executes a GET request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    fn get<'a>(
        &'a self,
        url: &'a Url,
        query: Option<&'a JsonMap>,
    ) -> impl Future<Output = Result<JsonMap>> + Send + 'a {
        self.execute(HttpMethod::Get, url, query)
    }

    /// Executes a POST request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    fn post<'a>(
        &'a self,
        url: &'a Url,
        body: Option<&'a JsonMap>,
    ) -> impl Future<Output = Result<JsonMap>> + Send + 'a {
        self.execute(HttpMethod::Post, url, body)
    }

    /// Executes a PUT request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    fn put<'a>(
        &'a self,
        url: &'a Url,
        body: Option<&'a JsonMap>,
    ) -> impl Future<Output = Result<JsonMap>> + Send + 'a {
        self.execute(HttpMethod::Put, url, body)
    }

    /// Executes a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    fn delete<'a>(
        &'a self,
        url: &'a Url,
        query: Option<&'a JsonMap>,
    ) -> impl Future<Output = Result<JsonMap>> + Send + 'a {
        self.execute(HttpMethod::Delete, url, query)
    }
}
