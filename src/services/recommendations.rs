//! Proactive security recommendations.

use serde::Serialize;
use tracing::instrument;

use super::FunctionClient;
use crate::errors::DevGuardResult;
use crate::types::{RecommendationsReport, SecurityData};

/// Endpoint name.
pub(crate) const FUNCTION: &str = "security-recommendations";
const FALLBACK_MESSAGE: &str = "Failed to generate recommendations";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsRequest<'a> {
    security_data: &'a SecurityData,
}

/// Recommendations service.
#[derive(Debug, Clone)]
pub struct RecommendationsService {
    functions: FunctionClient,
}

impl RecommendationsService {
    pub(crate) fn new(functions: FunctionClient) -> Self {
        Self { functions }
    }

    /// Generates recommendations for the given posture.
    #[instrument(skip(self, security_data), fields(total = security_data.total_vulnerabilities))]
    pub async fn generate(
        &self,
        security_data: &SecurityData,
    ) -> DevGuardResult<RecommendationsReport> {
        let report: RecommendationsReport = self
            .functions
            .json(
                FUNCTION,
                FALLBACK_MESSAGE,
                &RecommendationsRequest { security_data },
            )
            .await?;

        tracing::info!(
            count = report.recommendations.len(),
            risk_score = report.risk_score(),
            "Recommendations generated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DevGuardError;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generate_parses_report() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&serde_json::json!({
            "recommendations": [{"title": "Enable MFA", "priority": "high"}],
            "overallAssessment": "Fair",
            "riskScore": 64
        })));
        let service = RecommendationsService::new(fixtures::function_client(transport.clone()));

        let report = service.generate(&fixtures::security_data()).await.unwrap();

        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.risk_score, 64);
        let body: serde_json::Value =
            serde_json::from_slice(transport.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["securityData"]["totalVulnerabilities"], 24);
    }

    #[tokio::test]
    async fn test_quota_exhausted() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(402, "AI credits exhausted. Please add funds."));
        let service = RecommendationsService::new(fixtures::function_client(transport));

        let err = service.generate(&fixtures::security_data()).await.unwrap_err();
        assert!(matches!(err, DevGuardError::QuotaExhausted { .. }));
        assert!(!err.is_retryable());
    }
}
