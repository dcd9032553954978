//! DevGuard Client Library
//!
//! Client core for the DevGuard pull-request security dashboard. It talks to
//! the project's serverless AI functions, turns their server-sent event
//! streams into growing Markdown snapshots, and keeps the realtime record
//! stores (notifications, scan schedules, webhook tokens) in sync.
//!
//! # Features
//!
//! - **Streaming**: incremental SSE parsing with UTF-8 boundary handling,
//!   cancellation and request fencing
//! - **Services**: security insights, batch reports, recommendations and the
//!   remediation generate/validate/apply workflow
//! - **Stores**: repositories with change feeds, notification dispatch,
//!   scan scheduling and webhook-triggered scans
//! - **Observability**: tracing, metrics, credential redaction
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use devguard_client::{DevGuardClient, SecurityData};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DevGuardClient::from_env()?;
//!
//!     let data = SecurityData {
//!         total_vulnerabilities: 3,
//!         high: 1,
//!         medium: 1,
//!         low: 1,
//!         security_score: 72,
//!         repository_count: 2,
//!         ..SecurityData::default()
//!     };
//!
//!     let report = client.recommendations().generate(&data).await?;
//!     println!("risk score: {}", report.risk_score());
//!     Ok(())
//! }
//! ```
//!
//! # Streaming Example
//!
//! ```rust,no_run
//! use devguard_client::{BatchContext, DevGuardClient, GenerationSession, Vulnerability};
//!
//! # async fn run(client: DevGuardClient, findings: Vec<Vulnerability>) -> Result<(), devguard_client::DevGuardError> {
//! let session = GenerationSession::new();
//! let ticket = session.begin();
//!
//! let stream = client
//!     .batch_reports()
//!     .generate(&findings, &BatchContext::for_repository("acme/api"))
//!     .await?;
//!
//! let outcome = session.run(ticket, stream).await;
//! println!("{} ({} bytes)", outcome.state, outcome.content.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod services;
pub mod session;
pub mod store;
pub mod streaming;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{DevGuardClient, DevGuardClientBuilder};
pub use config::DevGuardConfig;
pub use errors::{DevGuardError, DevGuardResult};
pub use session::{GenerationSession, SessionView, Ticket};
pub use streaming::{SnapshotEvent, SnapshotStream, StreamOutcome, StreamState};

// Type re-exports
pub use types::{
    BatchContext, Priority, Recommendation, RecommendationsReport, SecurityData, Severity,
    SeverityCounts, Vulnerability,
};
pub use services::{
    BatchReport, RemediationOutcome, RemediationWorkflow, WorkflowStep,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
