//! Synchronous SSE snapshot accumulator.

use serde_json::Value;

use super::decoder::Utf8Decoder;
use super::{DATA_PREFIX, DONE_SENTINEL};

/// Lifecycle of one generation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    /// No bytes consumed yet.
    #[default]
    Idle,
    /// Consuming chunks.
    Streaming,
    /// The byte stream ended.
    Completed,
    /// A `data: [DONE]` line was seen.
    DoneSentinel,
    /// The caller cancelled the stream.
    Aborted,
    /// The byte stream failed.
    Errored,
}

impl StreamState {
    /// Returns true for the absorbing end states.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StreamState::Idle | StreamState::Streaming)
    }

    /// Returns true if the stream finished without error or cancellation.
    pub fn is_success(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::DoneSentinel)
    }

    /// Returns a stable name for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::DoneSentinel => "done",
            StreamState::Aborted => "aborted",
            StreamState::Errored => "errored",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns chunked SSE bytes into snapshots of the accumulated delta content.
///
/// Each call to [`feed`](Self::feed) returns the snapshots produced by that
/// chunk, in order. A snapshot is the full content so far, never a diff, so
/// every snapshot extends the previous one.
///
/// A `data:` line whose payload is not valid JSON is put back at the front
/// of the buffer and extraction pauses until the next chunk. The line is
/// retried then. It is never reported as an error.
#[derive(Debug, Default)]
pub struct SnapshotAccumulator {
    decoder: Utf8Decoder,
    buffer: String,
    content: String,
    state: StreamState,
    snapshots: u64,
    bytes: u64,
}

impl SnapshotAccumulator {
    /// Creates an idle accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one chunk of the response body.
    ///
    /// Returns nothing once a terminal state has been reached.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.state = StreamState::Streaming;
        self.bytes += chunk.len() as u64;

        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);
        self.drain_lines()
    }

    /// Marks the end of the byte stream.
    ///
    /// An unterminated trailing line is discarded, like any bytes left in
    /// the decoder.
    pub fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if !self.buffer.trim().is_empty() || self.decoder.pending_len() > 0 {
            tracing::debug!(
                buffered = self.buffer.len(),
                "Discarding unterminated data at end of stream"
            );
        }
        self.buffer.clear();
        self.state = StreamState::Completed;
    }

    /// Marks the stream as cancelled by the caller.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.buffer.clear();
            self.state = StreamState::Aborted;
        }
    }

    /// Marks the stream as failed.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.buffer.clear();
            self.state = StreamState::Errored;
        }
    }

    /// Returns the content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Takes the accumulated content, leaving it empty.
    pub fn take_content(&mut self) -> String {
        std::mem::take(&mut self.content)
    }

    /// Returns the current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Returns the number of snapshots produced.
    pub fn snapshot_count(&self) -> u64 {
        self.snapshots
    }

    /// Returns the number of body bytes consumed.
    pub fn bytes_received(&self) -> u64 {
        self.bytes
    }

    /// Returns the text waiting for a line terminator.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut snapshots = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let mut line = self.buffer[..newline].to_string();
            self.buffer.drain(..=newline);

            if line.ends_with('\r') {
                line.pop();
            }
            if line.starts_with(':') || line.trim().is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = payload.trim();

            if payload == DONE_SENTINEL {
                self.buffer.clear();
                self.state = StreamState::DoneSentinel;
                break;
            }

            match serde_json::from_str::<Value>(payload) {
                Ok(event) => {
                    if let Some(delta) = delta_content(&event).filter(|d| !d.is_empty()) {
                        self.content.push_str(delta);
                        self.snapshots += 1;
                        snapshots.push(self.content.clone());
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Incomplete SSE payload, waiting for more data");
                    self.buffer.insert(0, '\n');
                    self.buffer.insert_str(0, &line);
                    break;
                }
            }
        }

        snapshots
    }
}

/// Extracts `choices[0].delta.content` from a chat completion chunk.
pub fn delta_content(event: &Value) -> Option<&str> {
    event.pointer("/choices/0/delta/content")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn data_line(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_idle_until_fed() {
        let accumulator = SnapshotAccumulator::new();
        assert_eq!(accumulator.state(), StreamState::Idle);
        assert_eq!(accumulator.content(), "");
    }

    #[test]
    fn test_single_event_snapshot() {
        let mut accumulator = SnapshotAccumulator::new();
        let snapshots = accumulator.feed(data_line("Hello").as_bytes());

        assert_eq!(snapshots, vec!["Hello".to_string()]);
        assert_eq!(accumulator.state(), StreamState::Streaming);
        assert_eq!(accumulator.pending(), "");
    }

    #[test]
    fn test_snapshots_are_cumulative() {
        let mut accumulator = SnapshotAccumulator::new();
        let input = format!("{}{}{}", data_line("a"), data_line("b"), data_line("c"));
        let snapshots = accumulator.feed(input.as_bytes());

        assert_eq!(snapshots, vec!["a", "ab", "abc"]);
        assert_eq!(accumulator.snapshot_count(), 3);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut accumulator = SnapshotAccumulator::new();
        let line = data_line("x").replace('\n', "\r\n");
        assert_eq!(accumulator.feed(line.as_bytes()), vec!["x"]);
    }

    #[test]
    fn test_unparseable_line_is_rebuffered() {
        let mut accumulator = SnapshotAccumulator::new();
        let snapshots = accumulator.feed(b"data: {\"choices\":\r\ndata: more\n");

        assert!(snapshots.is_empty());
        assert_eq!(accumulator.pending(), "data: {\"choices\":\ndata: more\n");
        assert_eq!(accumulator.state(), StreamState::Streaming);
    }

    #[test]
    fn test_empty_delta_not_emitted() {
        let mut accumulator = SnapshotAccumulator::new();
        let snapshots = accumulator.feed(data_line("").as_bytes());
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_missing_delta_path_not_emitted() {
        let mut accumulator = SnapshotAccumulator::new();
        let snapshots = accumulator.feed(b"data: {\"choices\":[{\"finish_reason\":\"stop\"}]}\n");
        assert!(snapshots.is_empty());
        assert_eq!(accumulator.pending(), "");
    }

    #[test]
    fn test_done_sentinel_discards_buffered_lines() {
        let mut accumulator = SnapshotAccumulator::new();
        let input = format!("{}data: [DONE]\n{}", data_line("a"), data_line("b"));
        let snapshots = accumulator.feed(input.as_bytes());

        assert_eq!(snapshots, vec!["a"]);
        assert_eq!(accumulator.state(), StreamState::DoneSentinel);
        assert!(accumulator.feed(data_line("c").as_bytes()).is_empty());
        assert_eq!(accumulator.content(), "a");
    }

    #[test]
    fn test_done_sentinel_with_surrounding_whitespace() {
        let mut accumulator = SnapshotAccumulator::new();
        accumulator.feed(b"data:  [DONE]  \r\n");
        assert_eq!(accumulator.state(), StreamState::DoneSentinel);
    }

    #[test]
    fn test_finish_discards_unterminated_line() {
        let mut accumulator = SnapshotAccumulator::new();
        let line = data_line("tail");
        accumulator.feed(line.trim_end().as_bytes());
        accumulator.finish();

        assert_eq!(accumulator.state(), StreamState::Completed);
        assert_eq!(accumulator.content(), "");
    }

    #[test]
    fn test_terminal_states_absorb() {
        let mut accumulator = SnapshotAccumulator::new();
        accumulator.feed(data_line("a").as_bytes());
        accumulator.abort();
        accumulator.fail();
        accumulator.finish();

        assert_eq!(accumulator.state(), StreamState::Aborted);
        assert!(accumulator.feed(data_line("b").as_bytes()).is_empty());
    }

    #[test]
    fn test_state_names() {
        assert!(StreamState::DoneSentinel.is_terminal());
        assert!(StreamState::DoneSentinel.is_success());
        assert!(!StreamState::Aborted.is_success());
        assert!(!StreamState::Streaming.is_terminal());
        assert_eq!(StreamState::Errored.to_string(), "errored");
    }
}
