//! Error types for the DevGuard client.
//!
//! Separates the failures the dashboard surfaces to users (rate limiting,
//! exhausted credits, generic generation failure) from transport, stream and
//! configuration errors. Parse anomalies inside an SSE stream are recovered
//! locally and never appear here.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for DevGuard operations.
pub type DevGuardResult<T> = Result<T, DevGuardError>;

/// User-facing message for HTTP 429.
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// User-facing message for HTTP 402.
pub const QUOTA_EXHAUSTED_MESSAGE: &str = "AI credits exhausted. Please add funds to continue.";

/// Error type for DevGuard client operations.
#[derive(Debug, Error)]
pub enum DevGuardError {
    /// Configuration error (missing key, invalid base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Request validation failed before anything was sent.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue.
        message: String,
        /// The parameter that caused the error.
        param: Option<String>,
    },

    /// The proxy answered HTTP 429.
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited {
        /// Server-provided message, if any.
        message: Option<String>,
        /// Value of the `retry-after` header, if present.
        retry_after: Option<Duration>,
    },

    /// The proxy answered HTTP 402.
    #[error("AI credits exhausted. Please add funds to continue.")]
    QuotaExhausted {
        /// Server-provided message, if any.
        message: Option<String>,
    },

    /// Any other non-success status, a missing body, or an error payload in a
    /// success response.
    #[error("{message}")]
    GenerationFailed {
        /// HTTP status code, when the failure came from a response.
        status: Option<u16>,
        /// Human-readable message.
        message: String,
    },

    /// The byte stream failed after streaming had started.
    #[error("Stream error: {message}")]
    Stream {
        /// Error message.
        message: String,
        /// Content accumulated before the failure.
        partial_content: Option<String>,
    },

    /// Network/connection error before a response arrived.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Request timeout.
    #[error("Request timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Record store error.
    #[error("Store error: {message}")]
    Store {
        /// Error message.
        message: String,
    },

    /// Webhook token missing, unknown, or inactive.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message.
        message: String,
    },
}

/// Error body returned by the serverless functions.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ApiErrorBody {
    /// The error message.
    #[serde(default)]
    pub error: Option<String>,
}

impl DevGuardError {
    /// Maps a non-success HTTP status to the error taxonomy.
    ///
    /// `body` is the raw response body, from which an `{"error": ".."}`
    /// message is taken when present. `fallback` is used otherwise.
    pub fn from_status(status: u16, body: &[u8], fallback: &str) -> Self {
        let message = serde_json::from_slice::<ApiErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty());

        match status {
            429 => DevGuardError::RateLimited {
                message,
                retry_after: None,
            },
            402 => DevGuardError::QuotaExhausted { message },
            _ => DevGuardError::GenerationFailed {
                status: Some(status),
                message: message.unwrap_or_else(|| fallback.to_string()),
            },
        }
    }

    /// Attaches a `retry-after` value (seconds) to a rate limit error.
    #[must_use]
    pub fn with_retry_after(self, header: Option<&str>) -> Self {
        match self {
            DevGuardError::RateLimited { message, .. } => DevGuardError::RateLimited {
                message,
                retry_after: header
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs),
            },
            other => other,
        }
    }

    /// Returns the text shown inline and in the toast for this error.
    pub fn user_message(&self) -> String {
        match self {
            DevGuardError::RateLimited { .. } => RATE_LIMITED_MESSAGE.to_string(),
            DevGuardError::QuotaExhausted { .. } => QUOTA_EXHAUSTED_MESSAGE.to_string(),
            DevGuardError::GenerationFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the UI should offer a manual retry action.
    ///
    /// Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DevGuardError::QuotaExhausted { .. }
                | DevGuardError::Configuration { .. }
                | DevGuardError::Validation { .. }
                | DevGuardError::Unauthorized { .. }
        )
    }

    /// Returns a short, stable name for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DevGuardError::Configuration { .. } => "configuration",
            DevGuardError::Validation { .. } => "validation",
            DevGuardError::RateLimited { .. } => "rate_limited",
            DevGuardError::QuotaExhausted { .. } => "quota_exhausted",
            DevGuardError::GenerationFailed { .. } => "generation_failed",
            DevGuardError::Stream { .. } => "stream",
            DevGuardError::Network { .. } => "network",
            DevGuardError::Timeout { .. } => "timeout",
            DevGuardError::Serialization { .. } => "serialization",
            DevGuardError::Store { .. } => "store",
            DevGuardError::Unauthorized { .. } => "unauthorized",
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        DevGuardError::Validation {
            message: message.into(),
            param: None,
        }
    }

    /// Creates a validation error with parameter.
    pub fn validation_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        DevGuardError::Validation {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates a generation failure without an HTTP status.
    pub fn generation_failed(message: impl Into<String>) -> Self {
        DevGuardError::GenerationFailed {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        DevGuardError::Store {
            message: message.into(),
        }
    }
}

impl From<TransportError> for DevGuardError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => DevGuardError::Timeout {
                message: err.to_string(),
            },
            _ => DevGuardError::Network {
                message: err.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for DevGuardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DevGuardError::Timeout {
                message: err.to_string(),
            }
        } else {
            DevGuardError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for DevGuardError {
    fn from(err: serde_json::Error) -> Self {
        DevGuardError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for DevGuardError {
    fn from(err: url::ParseError) -> Self {
        DevGuardError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
