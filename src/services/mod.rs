//! Service implementations for the DevGuard function endpoints.
//!
//! Insights and batch reports stream Markdown through a
//! [`SnapshotStream`]; recommendations and remediation return JSON.
//! Every call checks the response status before any body is consumed.

mod batch;
mod insights;
mod recommendations;
mod remediation;

pub use batch::{BatchReport, BatchReportService};
pub use insights::InsightsService;
pub use recommendations::RecommendationsService;
pub use remediation::{
    RemediationOutcome, RemediationService, RemediationWorkflow, WorkflowStep,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::config::DevGuardConfig;
use crate::errors::{DevGuardError, DevGuardResult};
use crate::observability::{Observability, RequestTimer};
use crate::streaming::SnapshotStream;
use crate::transport::{HttpRequest, HttpTransport};

/// Message used when a successful response carries no body.
pub const NO_RESPONSE_BODY: &str = "No response body";

/// Shared plumbing for posting JSON to a function endpoint.
#[derive(Clone)]
pub(crate) struct FunctionClient {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<DevGuardConfig>,
    observability: Observability,
}

impl FunctionClient {
    pub(crate) fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: Arc<DevGuardConfig>,
        observability: Observability,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
            observability,
        }
    }

    fn build_request<B: Serialize + ?Sized>(
        &self,
        function: &str,
        body: &B,
        streaming: bool,
    ) -> DevGuardResult<HttpRequest> {
        let body = serde_json::to_vec(body)?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if streaming {
            headers.insert("Accept".to_string(), "text/event-stream".to_string());
        }
        for (name, value) in &self.config.custom_headers {
            headers.insert(name.clone(), value.clone());
        }
        self.auth.apply_auth(&mut headers);

        let mut request = HttpRequest::post(self.config.function_path(function)).with_body(body);
        request.headers = headers;
        if let Some(timeout) = self.config.request_timeout.filter(|_| !streaming) {
            request = request.with_timeout(timeout);
        }
        Ok(request)
    }

    /// Posts `body` and returns a snapshot stream over the SSE response.
    pub(crate) async fn stream<B: Serialize + ?Sized>(
        &self,
        function: &'static str,
        fallback: &str,
        body: &B,
    ) -> DevGuardResult<SnapshotStream> {
        let timer = RequestTimer::start(function);
        let request = self.build_request(function, body, true)?;

        let response = match self.transport.send_streaming(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(&timer, e.into())),
        };

        if !response.is_success() {
            let status = response.status;
            let retry_after = response.headers.get("retry-after").cloned();
            let body = response.into_body().await;
            let error = DevGuardError::from_status(status, &body, fallback)
                .with_retry_after(retry_after.as_deref());
            return Err(self.fail(&timer, error));
        }

        let Some(body) = response.stream else {
            return Err(self.fail(&timer, DevGuardError::generation_failed(NO_RESPONSE_BODY)));
        };

        self.observability.record_success(function, timer.elapsed());
        tracing::debug!(function, "Streaming response started");

        Ok(SnapshotStream::new(body)
            .with_metrics(function, Arc::clone(self.observability.metrics())))
    }

    /// Posts `body` and decodes a JSON response.
    pub(crate) async fn json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        function: &'static str,
        fallback: &str,
        body: &B,
    ) -> DevGuardResult<T> {
        let timer = RequestTimer::start(function);
        let request = self.build_request(function, body, false)?;

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(&timer, e.into())),
        };

        if !response.is_success() {
            let error = DevGuardError::from_status(response.status, &response.body, fallback)
                .with_retry_after(response.headers.get("retry-after").map(String::as_str));
            return Err(self.fail(&timer, error));
        }

        if response.body.is_empty() {
            return Err(self.fail(&timer, DevGuardError::generation_failed(NO_RESPONSE_BODY)));
        }

        match response.json::<T>() {
            Ok(value) => {
                self.observability.record_success(function, timer.elapsed());
                Ok(value)
            }
            Err(e) => Err(self.fail(&timer, e.into())),
        }
    }

    fn fail(&self, timer: &RequestTimer, error: DevGuardError) -> DevGuardError {
        self.observability
            .record_failure(timer.operation(), timer.elapsed(), &error);
        error
    }
}

impl std::fmt::Debug for FunctionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionClient")
            .field("base_url", &self.config.base_url)
            .field("scheme", &self.auth.scheme())
            .finish_non_exhaustive()
    }
}
