//! Proactive security recommendations.

use serde::{Deserialize, Serialize};

/// Default risk score used when the model output could not be parsed.
pub const DEFAULT_RISK_SCORE: u32 = 50;

/// Aggregate security posture sent for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityData {
    /// Total open vulnerabilities.
    pub total_vulnerabilities: u32,
    /// Critical findings.
    pub critical: u32,
    /// High findings.
    pub high: u32,
    /// Medium findings.
    pub medium: u32,
    /// Low findings.
    pub low: u32,
    /// Current security score, 0-100.
    pub security_score: u32,
    /// Recently observed vulnerability patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    /// Number of monitored repositories.
    pub repository_count: u32,
    /// Scans currently running.
    pub active_scans: u32,
    /// Timestamp of the last scan.
    pub last_scan: String,
    /// Most common vulnerability types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_types: Vec<String>,
}

/// Recommendation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Critical.
    Critical,
    /// High.
    High,
    /// Medium.
    Medium,
    /// Low.
    Low,
    /// Anything the model invented.
    #[serde(other)]
    Unknown,
}

/// A single recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Title.
    pub title: String,
    /// Priority.
    pub priority: Priority,
    /// Category, e.g. `authentication` or `dependencies`.
    #[serde(default)]
    pub category: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Expected impact.
    #[serde(default)]
    pub impact: String,
    /// Implementation steps.
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Recommendations returned by the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsReport {
    /// Recommendations, possibly empty.
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    /// Summary paragraph.
    #[serde(default)]
    pub overall_assessment: String,
    /// Risk score, 0-100 where 100 is highest risk.
    #[serde(default = "default_risk_score")]
    pub risk_score: u32,
}

fn default_risk_score() -> u32 {
    DEFAULT_RISK_SCORE
}

impl RecommendationsReport {
    /// Returns the risk score clamped to 0-100.
    pub fn risk_score(&self) -> u32 {
        self.risk_score.min(100)
    }

    /// Returns the recommendations with the given priority.
    pub fn by_priority(&self, priority: Priority) -> impl Iterator<Item = &Recommendation> {
        self.recommendations
            .iter()
            .filter(move |r| r.priority == priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let report: RecommendationsReport = serde_json::from_str("{}").unwrap();

        assert!(report.recommendations.is_empty());
        assert_eq!(report.overall_assessment, "");
        assert_eq!(report.risk_score, DEFAULT_RISK_SCORE);
    }

    #[test]
    fn test_unknown_priority() {
        let json = r#"{"recommendations":[
            {"title":"Rotate keys","priority":"urgent"},
            {"title":"Enable MFA","priority":"critical","steps":["a","b"]}
        ],"riskScore":140}"#;
        let report: RecommendationsReport = serde_json::from_str(json).unwrap();

        assert_eq!(report.recommendations[0].priority, Priority::Unknown);
        assert_eq!(report.by_priority(Priority::Critical).count(), 1);
        assert_eq!(report.risk_score(), 100);
    }

    #[test]
    fn test_security_data_wire_names() {
        let data = SecurityData {
            total_vulnerabilities: 3,
            repository_count: 2,
            last_scan: "2024-05-01T00:00:00Z".to_string(),
            ..SecurityData::default()
        };
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["totalVulnerabilities"], 3);
        assert_eq!(json["repositoryCount"], 2);
        assert!(json.get("patterns").is_none());
    }
}
