//! Observability module for the DevGuard client.
//!
//! Provides logging setup, credential redaction and metrics for generation
//! requests and streams.

mod logging;
mod metrics;

pub use logging::{redact, LogConfig, LogFormat, LogLevel};
pub use metrics::{DefaultMetricsCollector, GenerationMetrics, MetricsCollector};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::DevGuardError;

/// Installs the global tracing subscriber described by `config`.
///
/// Safe to call more than once; later calls return false.
pub fn init_tracing(config: &LogConfig) -> bool {
    config.init()
}

/// Observability facade shared by the services.
#[derive(Clone)]
pub struct Observability {
    metrics: Arc<dyn MetricsCollector>,
    logging: LogConfig,
}

impl Observability {
    /// Creates a facade around a metrics collector.
    pub fn new(metrics: Arc<dyn MetricsCollector>, logging: LogConfig) -> Self {
        Self { metrics, logging }
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.logging
    }

    /// Records a request whose response head was accepted.
    pub fn record_success(&self, operation: &str, duration: Duration) {
        self.metrics.record_request(operation, true, duration);
    }

    /// Records a request that failed before streaming began.
    pub fn record_failure(&self, operation: &str, duration: Duration, error: &DevGuardError) {
        self.metrics.record_request(operation, false, duration);
        self.metrics.record_error(error.kind());
        tracing::warn!(
            operation,
            kind = error.kind(),
            error = %self.logging.sanitize(&error.to_string()),
            "Generation request failed"
        );
    }
}

impl Default for Observability {
    fn default() -> Self {
        Self::new(Arc::new(DefaultMetricsCollector::new()), LogConfig::default())
    }
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

/// Request timer for measuring operation duration.
#[derive(Debug)]
pub struct RequestTimer {
    start: Instant,
    operation: &'static str,
}

impl RequestTimer {
    /// Starts a timer for `operation`.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_failure_counts_error_kind() {
        let observability = Observability::default();
        let error = DevGuardError::from_status(429, b"", "x");

        observability.record_failure("security-insights", Duration::from_millis(5), &error);
        observability.record_success("security-insights", Duration::from_millis(5));

        let metrics = observability.metrics().get_metrics();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.errors.get("rate_limited"), Some(&1));
    }

    #[test]
    fn test_request_timer() {
        let timer = RequestTimer::start("batch-security-analysis");
        assert_eq!(timer.operation(), "batch-security-analysis");
        assert!(timer.elapsed() < Duration::from_secs(5));
    }
}
