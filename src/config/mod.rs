//! Configuration module for the DevGuard client.
//!
//! Holds the project URL, publishable key and timeouts used to reach the
//! serverless function endpoints.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::errors::{DevGuardError, DevGuardResult};

/// Default path of the function endpoints below the project URL.
pub const DEFAULT_FUNCTIONS_PATH: &str = "functions/v1";

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the DevGuard client.
#[derive(Clone)]
pub struct DevGuardConfig {
    /// Publishable key (stored securely).
    pub(crate) api_key: SecretString,
    /// Project base URL.
    pub base_url: String,
    /// Path of the function endpoints below `base_url`.
    pub functions_path: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Timeout for buffered JSON calls. Streams are never bounded by it.
    pub request_timeout: Option<Duration>,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
}

impl DevGuardConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> DevGuardConfigBuilder {
        DevGuardConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DEVGUARD_SUPABASE_URL` (required): project base URL
    /// - `DEVGUARD_PUBLISHABLE_KEY` (required): publishable key
    /// - `DEVGUARD_TIMEOUT` (optional): JSON call timeout in seconds
    /// - `DEVGUARD_CONNECT_TIMEOUT` (optional): connect timeout in seconds
    pub fn from_env() -> DevGuardResult<Self> {
        let base_url =
            std::env::var("DEVGUARD_SUPABASE_URL").map_err(|_| DevGuardError::Configuration {
                message: "DEVGUARD_SUPABASE_URL environment variable not set".to_string(),
            })?;

        let mut builder = DevGuardConfigBuilder::new()
            .base_url(base_url)
            .api_key_from_env("DEVGUARD_PUBLISHABLE_KEY")?;

        if let Some(secs) = env_secs("DEVGUARD_TIMEOUT") {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        if let Some(secs) = env_secs("DEVGUARD_CONNECT_TIMEOUT") {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Returns the publishable key (exposing the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Returns the key hint (last 4 characters) for debugging.
    pub fn api_key_hint(&self) -> String {
        key_hint(self.api_key.expose_secret())
    }

    /// Returns the transport-relative path of a function.
    pub fn function_path(&self, function: &str) -> String {
        format!(
            "{}/{}",
            self.functions_path.trim_matches('/'),
            function.trim_start_matches('/')
        )
    }

    /// Returns the full URL of a function.
    pub fn function_url(&self, function: &str) -> String {
        format!("{}/{}", self.base_url, self.function_path(function))
    }
}

fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

pub(crate) fn key_hint(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 4 {
        format!("...{}", chars[chars.len() - 4..].iter().collect::<String>())
    } else {
        "****".to_string()
    }
}

impl std::fmt::Debug for DevGuardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevGuardConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("functions_path", &self.functions_path)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Builder for `DevGuardConfig`.
#[derive(Default)]
pub struct DevGuardConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    functions_path: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    custom_headers: Vec<(String, String)>,
}

impl DevGuardConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the publishable key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the publishable key from an environment variable.
    pub fn api_key_from_env(mut self, var_name: &str) -> DevGuardResult<Self> {
        let api_key = std::env::var(var_name).map_err(|_| DevGuardError::Configuration {
            message: format!("Environment variable {} not set", var_name),
        })?;
        self.api_key = Some(api_key);
        Ok(self)
    }

    /// Sets the project base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Overrides the functions path.
    #[must_use]
    pub fn functions_path(mut self, path: impl Into<String>) -> Self {
        self.functions_path = Some(path.into());
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the whole-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Adds a custom header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> DevGuardResult<DevGuardConfig> {
        let api_key = self.api_key.ok_or_else(|| DevGuardError::Configuration {
            message: "Publishable key is required".to_string(),
        })?;

        if api_key.trim().is_empty() {
            return Err(DevGuardError::Configuration {
                message: "Publishable key cannot be empty".to_string(),
            });
        }

        let base_url = self
            .base_url
            .ok_or_else(|| DevGuardError::Configuration {
                message: "Base URL is required".to_string(),
            })?
            .trim_end_matches('/')
            .to_string();

        let parsed = Url::parse(&base_url)?;
        let loopback = matches!(parsed.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
        match parsed.scheme() {
            "https" => {}
            "http" if loopback => {}
            _ => {
                return Err(DevGuardError::Configuration {
                    message: "Base URL must use HTTPS".to_string(),
                })
            }
        }

        Ok(DevGuardConfig {
            api_key: SecretString::new(api_key),
            base_url,
            functions_path: self
                .functions_path
                .unwrap_or_else(|| DEFAULT_FUNCTIONS_PATH.to_string()),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: self.request_timeout,
            custom_headers: self.custom_headers,
        })
    }
}
