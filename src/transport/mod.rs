//! HTTP transport layer for the DevGuard client.
//!
//! Provides the transport abstraction used to reach the serverless function
//! endpoints, including raw byte streams for SSE responses.

mod http;
mod streaming;

pub use http::{HttpRequest, HttpResponse, HttpTransport, HttpTransportImpl};
pub use streaming::{ByteStream, StreamingResponse};

use std::time::Duration;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// Invalid response, including a body that failed mid-read.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}

impl TransportError {
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Option<Duration>) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                timeout: timeout.unwrap_or_default(),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::InvalidResponse {
                message: err.to_string(),
            }
        }
    }
}
