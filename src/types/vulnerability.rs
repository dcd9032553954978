//! Vulnerability findings and batch report context.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// High severity.
    High,
    /// Medium severity.
    Medium,
    /// Low severity.
    Low,
}

impl Severity {
    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vulnerability found in a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    /// Finding identifier, absent on single-finding insights requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Short title.
    pub title: String,
    /// Severity.
    pub severity: Severity,
    /// File path.
    pub file: String,
    /// Line number.
    pub line: u32,
    /// Description.
    pub description: String,
    /// The offending code.
    pub vulnerable_code: String,
    /// The suggested fix.
    pub fixed_code: String,
    /// CWE identifier, e.g. `CWE-89`.
    pub cwe_id: String,
}

impl Vulnerability {
    /// Returns a copy with `fixed_code` replaced.
    #[must_use]
    pub fn with_fixed_code(&self, fixed_code: impl Into<String>) -> Self {
        Self {
            fixed_code: fixed_code.into(),
            ..self.clone()
        }
    }
}

/// Pull request context for a batch report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchContext {
    /// Repository name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Pull request title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_title: Option<String>,
    /// Pull request identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_id: Option<String>,
}

impl BatchContext {
    /// Creates a context for `repository`.
    pub fn for_repository(repository: impl Into<String>) -> Self {
        Self {
            repository: Some(repository.into()),
            ..Self::default()
        }
    }

    /// Sets the pull request title.
    #[must_use]
    pub fn pr_title(mut self, title: impl Into<String>) -> Self {
        self.pr_title = Some(title.into());
        self
    }
}

/// Severity counts shown in a report header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    /// High findings.
    pub high: usize,
    /// Medium findings.
    pub medium: usize,
    /// Low findings.
    pub low: usize,
}

impl SeverityCounts {
    /// Counts the findings by severity.
    pub fn tally(vulnerabilities: &[Vulnerability]) -> Self {
        vulnerabilities
            .iter()
            .fold(Self::default(), |mut counts, v| {
                match v.severity {
                    Severity::High => counts.high += 1,
                    Severity::Medium => counts.medium += 1,
                    Severity::Low => counts.low += 1,
                }
                counts
            })
    }

    /// Total number of findings.
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn finding(severity: Severity) -> Vulnerability {
        Vulnerability {
            id: None,
            title: "SQL Injection".to_string(),
            severity,
            file: "src/db.ts".to_string(),
            line: 42,
            description: "User input concatenated into query".to_string(),
            vulnerable_code: "query(`SELECT * FROM users WHERE id = ${id}`)".to_string(),
            fixed_code: "query('SELECT * FROM users WHERE id = $1', [id])".to_string(),
            cwe_id: "CWE-89".to_string(),
        }
    }

    #[test]
    fn test_vulnerability_wire_names() {
        let json = serde_json::to_value(finding(Severity::High)).unwrap();

        assert_eq!(json["severity"], "high");
        assert_eq!(json["cweId"], "CWE-89");
        assert!(json["vulnerableCode"].is_string());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_with_fixed_code_keeps_other_fields() {
        let original = finding(Severity::Low);
        let replaced = original.with_fixed_code("safe()");

        assert_eq!(replaced.fixed_code, "safe()");
        assert_eq!(replaced.title, original.title);
    }

    #[test]
    fn test_tally() {
        let findings = vec![
            finding(Severity::High),
            finding(Severity::High),
            finding(Severity::Medium),
            finding(Severity::Low),
        ];

        let counts = SeverityCounts::tally(&findings);
        assert_eq!(
            counts,
            SeverityCounts {
                high: 2,
                medium: 1,
                low: 1
            }
        );
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_batch_context_skips_missing_fields() {
        let json =
            serde_json::to_value(BatchContext::for_repository("acme/api").pr_title("Add login"))
                .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"repository": "acme/api", "prTitle": "Add login"})
        );
    }
}
