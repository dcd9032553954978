//! Streaming HTTP response handle.

use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

use super::TransportError;

/// Boxed byte stream of a response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Streaming HTTP response.
///
/// The body is not read until the stream is polled, so the status can be
/// checked before any consumer is constructed.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (lowercase names).
    pub headers: HashMap<String, String>,
    /// Byte stream, `None` if the response carried no body.
    pub stream: Option<ByteStream>,
}

impl StreamingResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drains the body into memory. Used to read JSON error payloads.
    pub async fn into_body(self) -> Vec<u8> {
        use futures::StreamExt;

        let mut body = Vec::new();
        if let Some(mut stream) = self.stream {
            while let Some(Ok(chunk)) = stream.next().await {
                body.extend_from_slice(&chunk);
            }
        }
        body
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_into_body_concatenates_chunks() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"{\"error\":")),
            Ok(Bytes::from_static(b"\"nope\"}")),
        ];
        let response = StreamingResponse {
            status: 500,
            headers: HashMap::new(),
            stream: Some(Box::pin(futures::stream::iter(chunks))),
        };

        assert!(!response.is_success());
        assert_eq!(response.into_body().await, b"{\"error\":\"nope\"}".to_vec());
    }

    #[tokio::test]
    async fn test_into_body_without_stream() {
        let response = StreamingResponse {
            status: 204,
            headers: HashMap::new(),
            stream: None,
        };

        assert!(response.is_success());
        assert!(response.into_body().await.is_empty());
    }
}
