//! Metrics collection for generation requests and streams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crate::streaming::StreamState;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records a request that got past (or failed) the status check.
    fn record_request(&self, operation: &str, success: bool, duration: Duration);

    /// Records a stream reaching a terminal state.
    fn record_stream(&self, operation: &str, state: StreamState, snapshots: u64, bytes: u64);

    /// Records an error by kind.
    fn record_error(&self, error_kind: &str);

    /// Gets current metrics.
    fn get_metrics(&self) -> GenerationMetrics;

    /// Resets all metrics.
    fn reset(&self);
}

/// Generation metrics snapshot.
#[derive(Debug, Clone, Default)]
pub struct GenerationMetrics {
    /// Total requests.
    pub total_requests: u64,
    /// Successful requests.
    pub successful_requests: u64,
    /// Failed requests.
    pub failed_requests: u64,
    /// Total latency until the response head, in milliseconds.
    pub total_latency_ms: u64,
    /// Snapshots emitted across all streams.
    pub snapshots_emitted: u64,
    /// Body bytes consumed across all streams.
    pub bytes_received: u64,
    /// Requests per operation.
    pub operations: HashMap<String, u64>,
    /// Finished streams by terminal state.
    pub stream_outcomes: HashMap<String, u64>,
    /// Error counts by kind.
    pub errors: HashMap<String, u64>,
}

impl GenerationMetrics {
    /// Calculates average latency in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }

    /// Calculates success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    /// Returns how many streams ended in `state`.
    pub fn streams_in(&self, state: StreamState) -> u64 {
        self.stream_outcomes
            .get(state.as_str())
            .copied()
            .unwrap_or(0)
    }
}

/// Default metrics collector implementation.
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_latency_ms: AtomicU64,
    snapshots_emitted: AtomicU64,
    bytes_received: AtomicU64,
    operations: RwLock<HashMap<String, u64>>,
    stream_outcomes: RwLock<HashMap<String, u64>>,
    errors: RwLock<HashMap<String, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            snapshots_emitted: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            operations: RwLock::new(HashMap::new()),
            stream_outcomes: RwLock::new(HashMap::new()),
            errors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for DefaultMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, operation: &str, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);

        if let Ok(mut ops) = self.operations.write() {
            *ops.entry(operation.to_string()).or_insert(0) += 1;
        }
    }

    fn record_stream(&self, _operation: &str, state: StreamState, snapshots: u64, bytes: u64) {
        self.snapshots_emitted.fetch_add(snapshots, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);

        if let Ok(mut outcomes) = self.stream_outcomes.write() {
            *outcomes.entry(state.as_str().to_string()).or_insert(0) += 1;
        }
    }

    fn record_error(&self, error_kind: &str) {
        if let Ok(mut errors) = self.errors.write() {
            *errors.entry(error_kind.to_string()).or_insert(0) += 1;
        }
    }

    fn get_metrics(&self) -> GenerationMetrics {
        GenerationMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            snapshots_emitted: self.snapshots_emitted.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            operations: self.operations.read().map(|o| o.clone()).unwrap_or_default(),
            stream_outcomes: self
                .stream_outcomes
                .read()
                .map(|o| o.clone())
                .unwrap_or_default(),
            errors: self.errors.read().map(|e| e.clone()).unwrap_or_default(),
        }
    }

    fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.snapshots_emitted.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);

        if let Ok(mut ops) = self.operations.write() {
            ops.clear();
        }
        if let Ok(mut outcomes) = self.stream_outcomes.write() {
            outcomes.clear();
        }
        if let Ok(mut errors) = self.errors.write() {
            errors.clear();
        }
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field(
                "snapshots_emitted",
                &self.snapshots_emitted.load(Ordering::Relaxed),
            )
            .field("failed_requests", &self.failed_requests.load(Ordering::Relaxed))
            .finish()
    }
}
