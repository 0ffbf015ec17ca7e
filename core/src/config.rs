//! Handler configuration.
//!
//! # Design
//! `HandlerConfig` carries everything a `RequestHandler` needs besides its
//! transport: where the API lives, how to authenticate and how to retry the
//! vendor's token refresh page. It can be built in code, deserialised with
//! serde, or read from `UBERSMITH_*` environment variables.

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use url::Url;

use crate::error::ApiError;

pub const ENV_BASE_URL: &str = "UBERSMITH_BASE_URL";
pub const ENV_USERNAME: &str = "UBERSMITH_USERNAME";
pub const ENV_PASSWORD: &str = "UBERSMITH_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "UBERSMITH_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded retry for the vendor's token refresh page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts; the refresh page asks browsers to reload after 4s.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Retry without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct HandlerConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl HandlerConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read `UBERSMITH_BASE_URL` (required), `UBERSMITH_USERNAME`,
    /// `UBERSMITH_PASSWORD` and `UBERSMITH_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::Config(format!("{ENV_BASE_URL} is not set")))?;
        let mut config = Self::new(base_url.trim());
        config.username = lookup(ENV_USERNAME);
        config.password = lookup(ENV_PASSWORD);
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ApiError::Config(format!("{ENV_TIMEOUT_SECS} is not a number: {raw}")))?;
            config.timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// The base URL must be absolute http(s) with a host.
    pub fn validate(&self) -> Result<(), ApiError> {
        let url = self.parsed_base_url()?;
        if url.host_str().is_none() {
            return Err(ApiError::Config(format!("base URL '{}' has no host", self.base_url)));
        }
        if self.retry.max_attempts == 0 {
            return Err(ApiError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    fn parsed_base_url(&self) -> Result<Url, ApiError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Config(format!("invalid base URL '{}': {e}", self.base_url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ApiError::Config(format!(
                "base URL must use http or https, got '{other}://'"
            ))),
        }
    }

    /// `base_url` with `method=<method>` appended to any existing query.
    pub fn method_url(&self, method: &str) -> Result<String, ApiError> {
        let mut url = self.parsed_base_url()?;
        url.query_pairs_mut().append_pair("method", method);
        Ok(url.into())
    }

    /// `Authorization` header value for HTTP basic auth, when a username is set.
    pub fn basic_auth(&self) -> Option<String> {
        let username = self.username.as_deref()?;
        let password = self.password.as_deref().unwrap_or("");
        Some(format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))))
    }
}
