//! Async snapshot stream over a response body.

use futures::stream::{AbortHandle, Abortable};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::accumulator::{SnapshotAccumulator, StreamState};
use crate::errors::DevGuardError;
use crate::observability::MetricsCollector;
use crate::transport::ByteStream;

/// Stream of accumulated-content snapshots for one generation request.
///
/// Yields `Ok(snapshot)` for every non-empty delta. A transport failure after
/// streaming started yields one `Err(DevGuardError::Stream)` carrying the
/// partial content, then the stream ends. The underlying byte stream is
/// dropped as soon as a terminal state is reached, on abort, or when this
/// value is dropped.
pub struct SnapshotStream {
    inner: Option<Abortable<ByteStream>>,
    accumulator: SnapshotAccumulator,
    pending: VecDeque<String>,
    abort_handle: AbortHandle,
    operation: &'static str,
    metrics: Option<Arc<dyn MetricsCollector>>,
    recorded: bool,
}

/// Final result of driving a [`SnapshotStream`] to the end.
#[derive(Debug)]
pub struct StreamOutcome {
    /// Content accumulated before the stream ended.
    pub content: String,
    /// Terminal state.
    pub state: StreamState,
    /// Mid-stream failure, if any.
    pub error: Option<DevGuardError>,
}

impl StreamOutcome {
    /// Converts the outcome into the final content or the stream error.
    pub fn into_result(self) -> Result<String, DevGuardError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.content),
        }
    }
}

/// Message delivered by [`SnapshotStream::into_channel`].
#[derive(Debug)]
pub enum SnapshotEvent {
    /// New accumulated content.
    Snapshot(String),
    /// The byte stream failed; no more snapshots follow.
    Failed(DevGuardError),
    /// The stream reached a terminal state. Always the last message.
    Finished(StreamState),
}

impl SnapshotStream {
    /// Wraps a response body.
    pub fn new(body: ByteStream) -> Self {
        let (abort_handle, registration) = AbortHandle::new_pair();
        Self {
            inner: Some(Abortable::new(body, registration)),
            accumulator: SnapshotAccumulator::new(),
            pending: VecDeque::new(),
            abort_handle,
            operation: "stream",
            metrics: None,
            recorded: false,
        }
    }

    /// Reports the terminal state to a metrics collector under `operation`.
    #[must_use]
    pub fn with_metrics(
        mut self,
        operation: &'static str,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        self.operation = operation;
        self.metrics = Some(metrics);
        self
    }

    /// Returns a handle that cancels this stream from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Cancels the stream and releases the response body.
    pub fn abort(&mut self) {
        self.abort_handle.abort();
        self.cancel();
    }

    /// Returns the current state.
    pub fn state(&self) -> StreamState {
        self.accumulator.state()
    }

    /// Returns the content accumulated so far.
    pub fn content(&self) -> &str {
        self.accumulator.content()
    }

    /// Drives the stream to its end, handing each snapshot to `render`.
    pub async fn render_with<F>(mut self, mut render: F) -> StreamOutcome
    where
        F: FnMut(&str),
    {
        let mut error = None;
        while let Some(item) = self.next().await {
            match item {
                Ok(snapshot) => render(&snapshot),
                Err(e) => error = Some(e),
            }
        }

        StreamOutcome {
            state: self.state(),
            content: self.accumulator.take_content(),
            error,
        }
    }

    /// Drives the stream to its end and returns the final content.
    pub async fn collect_content(self) -> Result<String, DevGuardError> {
        self.render_with(|_| {}).await.into_result()
    }

    /// Moves the consumer loop onto a task and delivers events over a channel.
    ///
    /// Dropping the receiver cancels the stream and releases the body, even
    /// while no chunk is arriving. Must be called within a Tokio runtime.
    pub fn into_channel(self, capacity: usize) -> mpsc::Receiver<SnapshotEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        tokio::spawn(async move {
            let mut stream = self;
            loop {
                let item = tokio::select! {
                    item = stream.next() => item,
                    () = tx.closed() => {
                        tracing::debug!("Snapshot receiver dropped while idle, cancelling");
                        stream.abort();
                        return;
                    }
                };
                let Some(item) = item else { break };

                let event = match item {
                    Ok(snapshot) => SnapshotEvent::Snapshot(snapshot),
                    Err(e) => SnapshotEvent::Failed(e),
                };
                if tx.send(event).await.is_err() {
                    tracing::debug!("Snapshot receiver dropped, cancelling stream");
                    stream.abort();
                    return;
                }
            }
            let _ = tx.send(SnapshotEvent::Finished(stream.state())).await;
        });

        rx
    }

    fn cancel(&mut self) {
        self.accumulator.abort();
        self.pending.clear();
        self.release();
    }

    fn release(&mut self) {
        self.inner = None;

        let state = self.accumulator.state();
        if self.recorded || !state.is_terminal() {
            return;
        }
        self.recorded = true;

        tracing::debug!(
            operation = self.operation,
            state = %state,
            snapshots = self.accumulator.snapshot_count(),
            bytes = self.accumulator.bytes_received(),
            "Stream finished"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_stream(
                self.operation,
                state,
                self.accumulator.snapshot_count(),
                self.accumulator.bytes_received(),
            );
        }
    }
}

impl Stream for SnapshotStream {
    type Item = Result<String, DevGuardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.abort_handle.is_aborted() && !this.accumulator.state().is_terminal() {
                this.cancel();
            }

            if let Some(snapshot) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(snapshot)));
            }

            if this.accumulator.state().is_terminal() {
                this.release();
                return Poll::Ready(None);
            }

            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match Pin::new(inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let snapshots = this.accumulator.feed(&bytes);
                    this.pending.extend(snapshots);
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::warn!(
                        operation = this.operation,
                        error = %e,
                        accumulated = this.accumulator.content().len(),
                        "Stream failed"
                    );
                    this.accumulator.fail();
                    this.pending.clear();
                    this.release();
                    return Poll::Ready(Some(Err(DevGuardError::Stream {
                        message: e.to_string(),
                        partial_content: Some(this.accumulator.content().to_string()),
                    })));
                }
                Poll::Ready(None) => {
                    if this.abort_handle.is_aborted() {
                        this.cancel();
                    } else {
                        this.accumulator.finish();
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        if !self.accumulator.state().is_terminal() {
            self.cancel();
        }
    }
}

impl std::fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("operation", &self.operation)
            .field("state", &self.accumulator.state())
            .field("content_len", &self.accumulator.content().len())
            .field("pending_snapshots", &self.pending.len())
            .finish()
    }
}
