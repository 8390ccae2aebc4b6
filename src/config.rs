//! Client configuration
//!
//! [`ClientConfig`] is built with a typed builder; every field has a
//! default that matches a local development backend. [`ClientConfig::from_env`]
//! layers environment overrides on top of those defaults.

use std::path::PathBuf;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::error::{PasaleError, Result};

/// Base URL used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
/// Path of the token refresh endpoint, relative to the base URL
pub const DEFAULT_REFRESH_PATH: &str = "/token/refresh/";
/// Login entry point handed to the session-expired handler
pub const DEFAULT_LOGIN_PATH: &str = "/login";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Primary base URL variable
pub const ENV_API_BASE_URL: &str = "PASALE_API_BASE_URL";
/// Fallback base URL variable
pub const ENV_API_URL: &str = "PASALE_API_URL";
/// Per-request timeout in whole seconds
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "PASALE_REQUEST_TIMEOUT_SECS";
/// Refresh exchange timeout in whole seconds
pub const ENV_REFRESH_TIMEOUT_SECS: &str = "PASALE_REFRESH_TIMEOUT_SECS";

/// Configuration for [`ApiClient`](crate::ApiClient)
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClientConfig"),
    builder_type(doc = "Builder for ClientConfig", vis = "pub")
)]
pub struct ClientConfig {
    /// API base URL without a trailing slash (e.g. `https://pasale.example/api`)
    #[builder(default = DEFAULT_API_BASE_URL.to_string(), setter(into))]
    pub base_url: String,

    /// Refresh endpoint path, appended to `base_url`
    #[builder(default = DEFAULT_REFRESH_PATH.to_string(), setter(into))]
    pub refresh_path: String,

    /// Where the session-expired handler should send the user
    #[builder(default = DEFAULT_LOGIN_PATH.to_string(), setter(into))]
    pub login_path: String,

    /// Upper bound on a single HTTP exchange
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,

    /// Upper bound on the refresh exchange; waiters are released when it elapses
    #[builder(default = DEFAULT_REFRESH_TIMEOUT)]
    pub refresh_timeout: Duration,

    /// Credential file used by [`FileStore`](crate::auth::FileStore) when no path is given
    #[builder(default, setter(strip_option, into))]
    pub credentials_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Build a configuration from the process environment.
    ///
    /// `PASALE_API_BASE_URL` wins over `PASALE_API_URL`; unset variables keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns `PasaleError::InvalidConfig` if a timeout variable is not a
    /// whole number of seconds or the base URL is not http(s).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an explicit lookup
    /// function, so callers can layer their own sources.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let base_url = lookup(ENV_API_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()));
        if let Some(url) = base_url {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REFRESH_TIMEOUT_SECS) {
            config.refresh_timeout = parse_secs(ENV_REFRESH_TIMEOUT_SECS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for obviously unusable values
    ///
    /// # Errors
    ///
    /// Returns `PasaleError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(PasaleError::invalid_config(format!(
                "base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(PasaleError::invalid_config("request timeout must be non-zero"));
        }
        if self.refresh_timeout.is_zero() {
            return Err(PasaleError::invalid_config("refresh timeout must be non-zero"));
        }
        Ok(())
    }

    /// Absolute URL of the refresh endpoint
    #[must_use]
    pub fn refresh_url(&self) -> String {
        crate::utils::resolve_url(&self.base_url, &self.refresh_path)
    }

    /// Credential file path, falling back to the platform config directory
    #[must_use]
    pub fn resolved_credentials_path(&self) -> PathBuf {
        self.credentials_path.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pasale")
                .join("session.json")
        })
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| PasaleError::invalid_config(format!("{key} must be whole seconds, got '{raw}'")))
}
