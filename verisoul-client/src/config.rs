//! Client configuration.
//!
//! [`ClientConfig`] is deserializable from TOML and carries every knob the
//! transport, retry strategy and circuit breaker read.
//!
//! ```toml
//! api_key = "sk_live_..."
//! environment = "production"
//! timeout_secs = 20
//! retry_attempts = 4
//! failure_threshold = 10
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Sandbox API base URL.
pub const SANDBOX_BASE_URL: &str = "https://api.sandbox.verisoul.ai";

/// Production API base URL.
pub const PRODUCTION_BASE_URL: &str = "https://api.verisoul.ai";

/// Errors raised while building or validating a client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Rule the value broke.
        reason: String,
    },

    /// TOML input could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The base URL is not a valid absolute URL.
    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}

/// API environment.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Sandbox environment for integration testing.
    #[default]
    Sandbox,
    /// Live environment.
    Production,
}

impl Environment {
    /// Base URL of the environment.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

/// Configuration shared by the transport, retry strategy and circuit breaker.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// API key sent as `x-api-key`.
    pub api_key: String,

    /// Target environment.
    #[serde(default)]
    pub environment: Environment,

    /// Overrides the environment base URL (proxies, mock servers).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Total request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum attempts per call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Upper bound for a single backoff delay in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,

    /// Duration after which a failed call counts as a timeout. Defaults to
    /// `timeout_secs`.
    #[serde(default)]
    pub breaker_timeout_secs: Option<u64>,

    /// Seconds the circuit stays open before a probe is allowed.
    #[serde(default = "default_breaker_recovery_time_secs")]
    pub breaker_recovery_time_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("retry_multiplier", &self.retry_multiplier)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("failure_threshold", &self.failure_threshold)
            .field("breaker_timeout_secs", &self.breaker_timeout_secs)
            .field("breaker_recovery_time_secs", &self.breaker_recovery_time_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            environment: Environment::default(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            failure_threshold: default_failure_threshold(),
            breaker_timeout_secs: None,
            breaker_recovery_time_secs: default_breaker_recovery_time_secs(),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field:
    /// - `api_key`: must not be empty
    /// - `timeout_secs`: must be 1-300 seconds
    /// - `connect_timeout_secs`: must be 1-`timeout_secs` seconds
    /// - `retry_attempts`, `failure_threshold`: must be at least 1
    /// - `retry_multiplier`: must be a finite number of at least 1.0
    /// - `retry_max_delay_ms`: must not be below `retry_delay_ms`
    /// - `breaker_timeout_secs`, `breaker_recovery_time_secs`: must be at least 1
    ///
    /// Returns [`ConfigError::BaseUrl`] if the base URL does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::invalid("api_key", "must not be empty"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ConfigError::invalid("timeout_secs", "must be between 1 and 300"));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > self.timeout_secs {
            return Err(ConfigError::invalid(
                "connect_timeout_secs",
                format!("must be between 1 and {}", self.timeout_secs),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::invalid("retry_attempts", "must be at least 1"));
        }
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            return Err(ConfigError::invalid("retry_multiplier", "must be a number >= 1.0"));
        }
        if self.retry_max_delay_ms < self.retry_delay_ms {
            return Err(ConfigError::invalid(
                "retry_max_delay_ms",
                "must not be lower than retry_delay_ms",
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold", "must be at least 1"));
        }
        if self.breaker_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("breaker_timeout_secs", "must be at least 1"));
        }
        if self.breaker_recovery_time_secs == 0 {
            return Err(ConfigError::invalid("breaker_recovery_time_secs", "must be at least 1"));
        }
        self.resolved_base_url()?;
        Ok(())
    }

    /// Base URL after applying the override, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the URL does not parse or is not HTTP(S).
    pub fn resolved_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.as_deref().unwrap_or_else(|| self.environment.base_url());
        let url = Url::parse(raw)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid("base_url", "must use http or https"));
        }
        Ok(url)
    }

    /// Returns timeout as Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns connect timeout as Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-call duration the circuit breaker treats as a timeout.
    #[must_use]
    pub fn breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_timeout_secs.unwrap_or(self.timeout_secs))
    }

    /// How long the circuit stays open before probing.
    #[must_use]
    pub const fn breaker_recovery_time(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_time_secs)
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_retry_multiplier() -> f64 {
    2.0
}

const fn default_retry_max_delay_ms() -> u64 {
    30_000
}

const fn default_failure_threshold() -> u64 {
    5
}

const fn default_breaker_recovery_time_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("key");
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.breaker_recovery_time_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_breaker_timeout_defaults_to_client_timeout() {
        let mut config = ClientConfig::new("key");
        config.timeout_secs = 45;
        assert_eq!(config.breaker_timeout(), Duration::from_secs(45));

        config.breaker_timeout_secs = Some(5);
        assert_eq!(config.breaker_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_toml_minimal() {
        let config = ClientConfig::from_toml("api_key = \"abc\"").unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.breaker_recovery_time(), Duration::from_secs(300));
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
            api_key = "abc"
            environment = "production"
            timeout_secs = 60
            connect_timeout_secs = 20
            retry_attempts = 5
            retry_delay_ms = 250
            retry_multiplier = 3.0
            retry_max_delay_ms = 10000
            failure_threshold = 8
            breaker_timeout_secs = 15
            breaker_recovery_time_secs = 120
        "#;

        let config = ClientConfig::from_toml(toml).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_delay_ms, 250);
        assert!((config.retry_multiplier - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.failure_threshold, 8);
        assert_eq!(config.breaker_timeout(), Duration::from_secs(15));
        assert_eq!(config.resolved_base_url().unwrap().as_str(), "https://api.verisoul.ai/");
    }

    #[test]
    fn test_from_toml_missing_api_key() {
        let result = ClientConfig::from_toml("timeout_secs = 10");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_toml_unknown_environment() {
        let result = ClientConfig::from_toml("api_key = \"abc\"\nenvironment = \"staging\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_empty_api_key() {
        let config = ClientConfig::new("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "api_key", .. })));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let mut config = ClientConfig::new("key");
        config.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "timeout_secs", .. })));

        config.timeout_secs = 301;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "timeout_secs", .. })));

        config.timeout_secs = 300;
        config.connect_timeout_secs = 300;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_connect_timeout_not_above_timeout() {
        let mut config = ClientConfig::new("key");
        config.timeout_secs = 5;
        config.connect_timeout_secs = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "connect_timeout_secs", .. })
        ));

        config.connect_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_retry_and_breaker_minimums() {
        let mut config = ClientConfig::new("key");
        config.retry_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "retry_attempts", .. })));

        let mut config = ClientConfig::new("key");
        config.failure_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "failure_threshold", .. })
        ));

        let mut config = ClientConfig::new("key");
        config.retry_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("key");
        config.retry_delay_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_override() {
        let mut config = ClientConfig::new("key");
        config.base_url = Some("http://127.0.0.1:8080".to_owned());
        assert_eq!(config.resolved_base_url().unwrap().as_str(), "http://127.0.0.1:8080/");

        config.base_url = Some("ftp://example.com".to_owned());
        assert!(config.validate().is_err());

        config.base_url = Some("not a url".to_owned());
        assert!(matches!(config.validate(), Err(ConfigError::BaseUrl(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig::new("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
