//! Streaming security insights for a single finding.

use serde::Serialize;
use tracing::instrument;

use super::FunctionClient;
use crate::errors::DevGuardResult;
use crate::streaming::SnapshotStream;
use crate::types::Vulnerability;

/// Endpoint name.
pub(crate) const FUNCTION: &str = "security-insights";
const FALLBACK_MESSAGE: &str = "Failed to analyze vulnerability";

#[derive(Serialize)]
struct InsightsRequest<'a> {
    vulnerability: &'a Vulnerability,
}

/// Security insights service.
#[derive(Debug, Clone)]
pub struct InsightsService {
    functions: FunctionClient,
}

impl InsightsService {
    pub(crate) fn new(functions: FunctionClient) -> Self {
        Self { functions }
    }

    /// Requests an explanation of `vulnerability`.
    ///
    /// Status failures are returned before any snapshot is produced.
    #[instrument(
        skip(self, vulnerability),
        fields(title = %vulnerability.title, cwe = %vulnerability.cwe_id)
    )]
    pub async fn analyze(&self, vulnerability: &Vulnerability) -> DevGuardResult<SnapshotStream> {
        self.functions
            .stream(FUNCTION, FALLBACK_MESSAGE, &InsightsRequest { vulnerability })
            .await
    }
}
