//! Request and response types of the DevGuard function endpoints.

pub mod recommendations;
pub mod remediation;
pub mod vulnerability;

pub use recommendations::{Priority, Recommendation, RecommendationsReport, SecurityData};
pub use remediation::{
    AdditionalChange, ApplyPlan, Confidence, RemediationAction, RemediationContext,
    RemediationEnvelope, RemediationPlan, RemediationRequest, ValidationReport,
};
pub use vulnerability::{BatchContext, Severity, SeverityCounts, Vulnerability};
