//! Streaming batch security reports.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::instrument;

use super::FunctionClient;
use crate::errors::{DevGuardError, DevGuardResult};
use crate::streaming::SnapshotStream;
use crate::types::{BatchContext, SeverityCounts, Vulnerability};

/// Endpoint name.
pub(crate) const FUNCTION: &str = "batch-security-analysis";
const FALLBACK_MESSAGE: &str = "Failed to generate report";

#[derive(Serialize)]
struct BatchRequest<'a> {
    vulnerabilities: &'a [Vulnerability],
    context: &'a BatchContext,
}

/// Batch report service.
#[derive(Debug, Clone)]
pub struct BatchReportService {
    functions: FunctionClient,
}

impl BatchReportService {
    pub(crate) fn new(functions: FunctionClient) -> Self {
        Self { functions }
    }

    /// Requests an executive report covering all `vulnerabilities`.
    #[instrument(skip(self, vulnerabilities, context), fields(count = vulnerabilities.len()))]
    pub async fn generate(
        &self,
        vulnerabilities: &[Vulnerability],
        context: &BatchContext,
    ) -> DevGuardResult<SnapshotStream> {
        if vulnerabilities.is_empty() {
            return Err(DevGuardError::validation_param(
                "At least one vulnerability is required",
                "vulnerabilities",
            ));
        }

        let counts = SeverityCounts::tally(vulnerabilities);
        tracing::debug!(
            high = counts.high,
            medium = counts.medium,
            low = counts.low,
            "Requesting batch report"
        );

        self.functions
            .stream(
                FUNCTION,
                FALLBACK_MESSAGE,
                &BatchRequest {
                    vulnerabilities,
                    context,
                },
            )
            .await
    }
}

/// A finished batch report.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Markdown content.
    pub content: String,
    /// Severity counts of the analysed findings.
    pub counts: SeverityCounts,
}

impl BatchReport {
    /// Creates a report from generated content.
    pub fn new(content: impl Into<String>, vulnerabilities: &[Vulnerability]) -> Self {
        Self {
            content: content.into(),
            counts: SeverityCounts::tally(vulnerabilities),
        }
    }

    /// Download file name for a report generated on `date`.
    pub fn file_name(date: NaiveDate) -> String {
        format!("security-report-{}.md", date.format("%Y-%m-%d"))
    }

    /// Download file name for a report generated today (UTC).
    pub fn file_name_today() -> String {
        Self::file_name(chrono::Utc::now().date_naive())
    }
}
