//! Mock implementations for testing.
//!
//! Provides a mock transport with queued JSON and chunked streaming
//! responses, a mock auth provider and fixtures, for tests that should not
//! reach a real project.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::auth::AuthProvider;
use crate::errors::DevGuardError;
use crate::transport::{
    ByteStream, HttpRequest, HttpResponse, HttpTransport, StreamingResponse, TransportError,
};

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Whole-exchange timeout carried by the request.
    pub timeout: Option<Duration>,
}

impl RecordedRequest {
    /// Parses the body as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(self.body.as_deref()?).ok()
    }
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Body, delivered as one chunk per element when streamed.
    pub chunks: Vec<Vec<u8>>,
    /// Transport failure raised after the chunks.
    pub stream_error: Option<String>,
    /// Whether the response carries a body at all.
    pub has_body: bool,
}

impl MockResponse {
    fn new(status: u16, content_type: &str, chunks: Vec<Vec<u8>>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            status,
            headers,
            chunks,
            stream_error: None,
            has_body: true,
        }
    }

    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(200, "application/json", vec![body])
    }

    /// Creates an error response with an `{"error": message}` body.
    ///
    /// An empty message produces an empty body.
    pub fn error(status: u16, message: &str) -> Self {
        let body = if message.is_empty() {
            Vec::new()
        } else {
            serde_json::to_vec(&serde_json::json!({ "error": message })).unwrap_or_default()
        };
        Self::new(status, "application/json", vec![body])
    }

    /// Creates an event stream with one chunk per line.
    pub fn sse<S: Into<String>>(lines: Vec<S>) -> Self {
        Self::chunked(lines.into_iter().map(|l| l.into().into_bytes()).collect())
    }

    /// Creates an event stream delivered as the given raw chunks.
    pub fn chunked(chunks: Vec<Vec<u8>>) -> Self {
        Self::new(200, "text/event-stream", chunks)
    }

    /// Creates a successful response without a body.
    pub fn empty() -> Self {
        Self {
            has_body: false,
            ..Self::new(200, "text/event-stream", Vec::new())
        }
    }

    /// Fails the stream after the queued chunks.
    #[must_use]
    pub fn with_stream_error(mut self, message: impl Into<String>) -> Self {
        self.stream_error = Some(message.into());
        self
    }

    /// Creates a response with custom status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    fn into_byte_stream(self) -> Option<ByteStream> {
        if !self.has_body {
            return None;
        }
        let mut items: Vec<Result<Bytes, TransportError>> =
            self.chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        if let Some(message) = self.stream_error {
            items.push(Err(TransportError::InvalidResponse { message }));
        }
        Some(Box::pin(futures::stream::iter(items)))
    }
}

/// Mock HTTP transport for testing.
///
/// `send` and `send_streaming` take responses from separate queues.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    stream_responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Mutex<Option<MockResponse>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `send`.
    pub fn queue(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Queues a JSON response for `send`.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues a response for `send_streaming`.
    pub fn queue_stream(&self, response: MockResponse) {
        lock(&self.stream_responses).push_back(response);
    }

    /// Sets the response used when a queue is empty.
    pub fn set_default(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_response(&self, queue: &Mutex<VecDeque<MockResponse>>) -> MockResponse {
        lock(queue).pop_front().unwrap_or_else(|| {
            lock(&self.default_response)
                .clone()
                .unwrap_or_else(|| MockResponse::error(500, "No mock response configured"))
        })
    }

    fn record_request(&self, request: &HttpRequest) {
        lock(&self.requests).push(RecordedRequest {
            path: request.path.clone(),
            body: request.body.clone(),
            headers: request.headers.clone(),
            timeout: request.timeout,
        });
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.record_request(&request);

        let response = self.next_response(&self.responses);
        Ok(HttpResponse {
            status: response.status,
            body: response.body(),
            headers: response.headers,
        })
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        self.record_request(&request);

        let response = self.next_response(&self.stream_responses);
        Ok(StreamingResponse {
            status: response.status,
            headers: response.headers.clone(),
            stream: response.into_byte_stream(),
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .finish()
    }
}

/// Mock auth provider for testing.
pub struct MockAuth {
    api_key: String,
}

impl MockAuth {
    /// Creates a new mock auth provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new("sb_publishable_mock_key")
    }
}

impl AuthProvider for MockAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> Result<(), DevGuardError> {
        Ok(())
    }
}

impl std::fmt::Debug for MockAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAuth").finish()
    }
}

/// Test fixtures for findings and event streams.
pub mod fixtures {
    use bytes::Bytes;
    use std::sync::Arc;

    use super::{MockAuth, MockTransport};
    use crate::config::DevGuardConfig;
    use crate::observability::Observability;
    use crate::services::FunctionClient;
    use crate::streaming::SnapshotStream;
    use crate::transport::{ByteStream, TransportError};
    use crate::types::{SecurityData, Severity, Vulnerability};

    /// A high-severity SQL injection finding.
    pub fn vulnerability() -> Vulnerability {
        Vulnerability {
            id: Some("vuln-1".to_string()),
            title: "SQL Injection in user lookup".to_string(),
            severity: Severity::High,
            file: "src/api/users.ts".to_string(),
            line: 42,
            description: "User input is concatenated into a SQL query".to_string(),
            vulnerable_code: "db.query(`SELECT * FROM users WHERE id = ${id}`)".to_string(),
            fixed_code: "db.query('SELECT * FROM users WHERE id = $1', [id])".to_string(),
            cwe_id: "CWE-89".to_string(),
        }
    }

    /// The dashboard's sample posture.
    pub fn security_data() -> SecurityData {
        SecurityData {
            total_vulnerabilities: 24,
            critical: 3,
            high: 8,
            medium: 9,
            low: 4,
            security_score: 72,
            patterns: vec!["Missing authentication checks on API endpoints".to_string()],
            repository_count: 12,
            active_scans: 3,
            last_scan: "2024-05-01T12:00:00Z".to_string(),
            common_types: vec!["CWE-89: SQL Injection".to_string()],
        }
    }

    /// One `data:` line carrying `content` as a delta, newline-terminated.
    pub fn delta_line(content: &str) -> String {
        let event = serde_json::json!({
            "choices": [{ "delta": { "content": content } }]
        });
        format!("data: {event}\n")
    }

    /// The `[DONE]` sentinel line.
    pub fn done_line() -> String {
        "data: [DONE]\n".to_string()
    }

    /// A byte stream yielding each element as one chunk.
    pub fn byte_stream<C: Into<Vec<u8>>>(chunks: Vec<C>) -> ByteStream {
        let items: Vec<Result<Bytes, TransportError>> = chunks
            .into_iter()
            .map(|c| Ok(Bytes::from(c.into())))
            .collect();
        Box::pin(futures::stream::iter(items))
    }

    /// A snapshot stream over the given chunks.
    pub fn snapshot_stream<C: Into<Vec<u8>>>(chunks: Vec<C>) -> SnapshotStream {
        SnapshotStream::new(byte_stream(chunks))
    }

    /// A configuration pointing at a loopback project.
    pub fn config() -> DevGuardConfig {
        DevGuardConfig {
            api_key: secrecy::SecretString::new("sb_publishable_mock_key".to_string()),
            base_url: "http://127.0.0.1:54321".to_string(),
            functions_path: crate::config::DEFAULT_FUNCTIONS_PATH.to_string(),
            connect_timeout: crate::config::DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            custom_headers: Vec::new(),
        }
    }

    pub(crate) fn function_client(transport: Arc<MockTransport>) -> FunctionClient {
        FunctionClient::new(
            transport,
            Arc::new(MockAuth::default()),
            Arc::new(config()),
            Observability::default(),
        )
    }
}
