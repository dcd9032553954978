//! DevGuard API client.
//!
//! Wires configuration, auth, transport and observability into the
//! generation services.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthProvider, PublishableKeyAuth};
use crate::config::{DevGuardConfig, DevGuardConfigBuilder};
use crate::errors::{DevGuardError, DevGuardResult};
use crate::observability::{DefaultMetricsCollector, LogConfig, MetricsCollector, Observability};
use crate::services::{
    BatchReportService, FunctionClient, InsightsService, RecommendationsService,
    RemediationService, RemediationWorkflow,
};
use crate::transport::{HttpTransport, HttpTransportImpl};

/// The main DevGuard client.
///
/// # Example
///
/// ```rust,no_run
/// use devguard_client::DevGuardClient;
/// use devguard_client::types::{Severity, Vulnerability};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DevGuardClient::builder()
///         .api_key("sb_publishable_key")
///         .base_url("https://project.supabase.co")
///         .build()?;
///
///     let finding = Vulnerability {
///         id: None,
///         title: "SQL Injection".into(),
///         severity: Severity::High,
///         file: "src/db.ts".into(),
///         line: 42,
///         description: "Unparameterised query".into(),
///         vulnerable_code: "query(`... ${id}`)".into(),
///         fixed_code: "query('... $1', [id])".into(),
///         cwe_id: "CWE-89".into(),
///     };
///
///     let outcome = client
///         .insights()
///         .analyze(&finding)
///         .await?
///         .render_with(|markdown| println!("{markdown}"))
///         .await;
///     println!("finished: {}", outcome.state);
///     Ok(())
/// }
/// ```
pub struct DevGuardClient {
    config: Arc<DevGuardConfig>,
    insights: InsightsService,
    batch_reports: BatchReportService,
    recommendations: RecommendationsService,
    remediation: RemediationService,
    observability: Observability,
}

impl DevGuardClient {
    /// Creates a new client builder.
    pub fn builder() -> DevGuardClientBuilder {
        DevGuardClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// See [`DevGuardConfig::from_env`] for the variables read.
    pub fn from_env() -> DevGuardResult<Self> {
        let config = DevGuardConfig::from_env()?;
        DevGuardClientBuilder::from_config(config).build()
    }

    /// Returns the security insights service.
    pub fn insights(&self) -> &InsightsService {
        &self.insights
    }

    /// Returns the batch report service.
    pub fn batch_reports(&self) -> &BatchReportService {
        &self.batch_reports
    }

    /// Returns the recommendations service.
    pub fn recommendations(&self) -> &RecommendationsService {
        &self.recommendations
    }

    /// Returns the remediation service.
    pub fn remediation(&self) -> &RemediationService {
        &self.remediation
    }

    /// Creates an idle remediation workflow.
    pub fn remediation_workflow(&self) -> RemediationWorkflow {
        RemediationWorkflow::new(self.remediation.clone())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DevGuardConfig {
        &self.config
    }

    /// Returns the observability facade.
    pub fn observability(&self) -> &Observability {
        &self.observability
    }
}

impl std::fmt::Debug for DevGuardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevGuardClient")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for the DevGuard client.
pub struct DevGuardClientBuilder {
    config_builder: DevGuardConfigBuilder,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    log_config: LogConfig,
}

impl DevGuardClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: DevGuardConfigBuilder::new(),
            transport: None,
            auth: None,
            metrics: None,
            log_config: LogConfig::default(),
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: DevGuardConfig) -> Self {
        let mut config_builder = DevGuardConfigBuilder::new()
            .api_key(config.api_key())
            .base_url(&config.base_url)
            .functions_path(&config.functions_path)
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            config_builder = config_builder.request_timeout(timeout);
        }
        for (name, value) in &config.custom_headers {
            config_builder = config_builder.header(name, value);
        }

        Self {
            config_builder,
            ..Self::new()
        }
    }

    /// Sets the publishable key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_key(api_key);
        self
    }

    /// Sets the project base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.connect_timeout(timeout);
        self
    }

    /// Sets the whole-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.request_timeout(timeout);
        self
    }

    /// Adds a custom header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.header(name, value);
        self
    }

    /// Sets a custom transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider.
    #[must_use]
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets a custom metrics collector.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the log configuration.
    #[must_use]
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// Builds the client.
    pub fn build(self) -> DevGuardResult<DevGuardClient> {
        let config = Arc::new(self.config_builder.build()?);

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                HttpTransportImpl::new(&config.base_url, config.connect_timeout).map_err(|e| {
                    DevGuardError::Configuration {
                        message: e.to_string(),
                    }
                })?,
            ),
        };

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(a) => a,
            None => Arc::new(PublishableKeyAuth::from_string(config.api_key())),
        };
        auth.validate()?;

        let metrics: Arc<dyn MetricsCollector> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new()));
        let observability = Observability::new(metrics, self.log_config);

        let functions = FunctionClient::new(
            transport,
            auth,
            Arc::clone(&config),
            observability.clone(),
        );

        tracing::debug!(
            base_url = %config.base_url,
            key = %config.api_key_hint(),
            "DevGuard client created"
        );

        Ok(DevGuardClient {
            config,
            insights: InsightsService::new(functions.clone()),
            batch_reports: BatchReportService::new(functions.clone()),
            recommendations: RecommendationsService::new(functions.clone()),
            remediation: RemediationService::new(functions),
            observability,
        })
    }
}

impl Default for DevGuardClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
