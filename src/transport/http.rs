//! HTTP transport implementation.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

use super::{ByteStream, StreamingResponse, TransportError};

/// A POST to one of the project's functions.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request path, relative to the transport's base URL.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Bound on the whole exchange. Left unset for streams.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a new POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (lowercase names).
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP transport trait.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request and buffer the whole response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send an HTTP request and return the body as an unread byte stream.
    async fn send_streaming(&self, request: HttpRequest)
        -> Result<StreamingResponse, TransportError>;
}

/// HTTP transport implementation using reqwest.
pub struct HttpTransportImpl {
    client: Client,
    base_url: String,
}

impl HttpTransportImpl {
    /// Creates a new HTTP transport.
    ///
    /// Only connecting is bounded here. Whole-exchange limits travel on each
    /// [`HttpRequest`] so that streams are not cut off.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let builder = ClientBuilder::new()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(60));

        let client = builder.build().map_err(|e| TransportError::Connection {
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Builds the full URL for a path.
    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(&self, request: HttpRequest) -> Result<reqwest::Response, TransportError> {
        let url = self.build_url(&request.path);

        let mut req_builder = self.client.post(&url);

        for (name, value) in &request.headers {
            req_builder = req_builder.header(name, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        req_builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, request.timeout))
    }
}

fn collect_headers(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

#[async_trait]
impl HttpTransport for HttpTransportImpl {
    #[instrument(skip(self, request), fields(path = %request.path))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self.execute(request).await?;

        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::InvalidResponse {
                message: e.to_string(),
            })?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    #[instrument(skip(self, request), fields(path = %request.path))]
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let response = self.execute(request).await?;

        let status = response.status().as_u16();
        let headers = collect_headers(&response);

        let stream: ByteStream = Box::pin(futures::StreamExt::map(
            response.bytes_stream(),
            |result| {
                result.map_err(|e| TransportError::InvalidResponse {
                    message: e.to_string(),
                })
            },
        ));

        Ok(StreamingResponse {
            status,
            headers,
            stream: Some(stream),
        })
    }
}

impl std::fmt::Debug for HttpTransportImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransportImpl")
            .field("base_url", &self.base_url)
            .finish()
    }
}
