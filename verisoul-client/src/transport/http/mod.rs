//! HTTP transport implementation.
//!
//! This module provides the reqwest-backed [`Transport`]. Every request is
//! authenticated with the `x-api-key` header and every response is run
//! through [`response`](crate::transport::response) classification.

use std::time::Duration;

use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde_json::Value;
use tracing::instrument;
use url::Url;

use crate::{
    config::{ClientConfig, ConfigError},
    error::{ApiError, Result},
    transport::{
        HttpMethod, JsonMap, Transport,
        response::{classify_status, parse_success_body},
        sealed,
    },
};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const CLIENT_USER_AGENT: &str = concat!("verisoul-client/", env!("CARGO_PKG_VERSION"));

/// HTTP/1.1 transport using reqwest.
///
/// Connection pooling and keep-alive come from the underlying
/// [`reqwest::Client`]; cloning the transport shares the pool.
///
/// # Examples
///
/// ```
/// use verisoul_client::{config::ClientConfig, transport::HttpTransport};
///
/// let transport = HttpTransport::with_config(&ClientConfig::new("sk_test")).unwrap();
/// assert_eq!(transport.timeout().as_secs(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates HTTP transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn with_config(config: &ClientConfig) -> std::result::Result<Self, ConfigError> {
        let mut api_key = HeaderValue::from_str(&config.api_key).map_err(|e| ConfigError::Invalid {
            field: "api_key",
            reason: e.to_string(),
        })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(CLIENT_USER_AGENT)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self { client, timeout: config.timeout() })
    }

    /// Total request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip_all, fields(method = %method, path = url.path()))]
    async fn execute_request(
        &self,
        method: HttpMethod,
        url: &Url,
        data: Option<&JsonMap>,
    ) -> Result<JsonMap> {
        let endpoint = url.path();

        let mut request = match method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
            HttpMethod::Put => self.client.put(url.clone()),
            HttpMethod::Delete => self.client.delete(url.clone()),
        };

        if let Some(data) = data {
            request = if method.has_body() {
                request.header(CONTENT_TYPE, "application/json").json(data)
            } else {
                request.query(&query_pairs(data))
            };
        }

        let response = request.send().await.map_err(|e| self.classify_error(endpoint, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        tracing::debug!(status, "Received API response");

        // The timeout covers the whole exchange, so reading the body can time out too.
        let body = response.text().await.map_err(|e| self.classify_error(endpoint, e))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(endpoint, status, body));
        }

        parse_success_body(endpoint, status, content_type.as_deref(), body)
    }

    fn classify_error(&self, endpoint: &str, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::timeout(endpoint, self.timeout).with_source(error)
        } else if error.is_connect() {
            ApiError::connection(endpoint, error)
        } else {
            ApiError::request_failed(endpoint, error)
        }
    }
}

impl Transport for HttpTransport {
    async fn execute<'a>(
        &'a self,
        method: HttpMethod,
        url: &'a Url,
        data: Option<&'a JsonMap>,
    ) -> Result<JsonMap> {
        self.execute_request(method, url, data).await
    }
}

/// Flattens a JSON object into query pairs.
///
/// Strings are sent verbatim, nulls are skipped and every other value uses its
/// JSON text.
fn query_pairs(data: &JsonMap) -> Vec<(&str, String)> {
    data.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), value)
        })
        .collect()
}
