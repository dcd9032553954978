//! Auto-remediation request and result shapes.

use serde::{Deserialize, Serialize};

use super::vulnerability::Vulnerability;

/// Default branch used when none is configured.
pub const DEFAULT_BRANCH: &str = "main";

/// Remediation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationAction {
    /// Produce an enhanced fix.
    Generate,
    /// Review a proposed fix.
    Validate,
    /// Produce the commands and pull request text to apply a fix.
    Apply,
}

impl RemediationAction {
    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            RemediationAction::Generate => "generate",
            RemediationAction::Validate => "validate",
            RemediationAction::Apply => "apply",
        }
    }
}

/// Repository context for the `apply` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationContext {
    /// Repository URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Target branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl RemediationContext {
    /// Creates a context, defaulting the branch to `main`.
    pub fn new(repository: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            repository: Some(repository.into()),
            branch: Some(branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string())),
        }
    }

    /// Returns the branch or `main`.
    pub fn branch_or_default(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

/// Body posted to the remediation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationRequest<'a> {
    /// The finding.
    pub vulnerability: &'a Vulnerability,
    /// Requested action.
    pub action: RemediationAction,
    /// Repository context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a RemediationContext>,
}

/// Envelope returned by the remediation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemediationEnvelope<T> {
    /// Set on success.
    #[serde(default)]
    pub success: bool,
    /// Echo of the requested action.
    #[serde(default)]
    pub action: Option<RemediationAction>,
    /// Action-specific result.
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    /// Failure message, possibly on a 2xx response.
    #[serde(default)]
    pub error: Option<String>,
}

/// A file touched by a fix besides the vulnerable one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalChange {
    /// File path.
    pub file: String,
    /// Description of the change.
    pub change: String,
}

/// Result of the `generate` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemediationPlan {
    /// Production-ready fixed code.
    pub enhanced_fix: String,
    /// Explanation of the fix.
    pub explanation: String,
    /// Implementation steps.
    pub steps: Vec<String>,
    /// Suggested tests.
    pub test_cases: Vec<String>,
    /// Other files that may need changes.
    pub additional_changes: Vec<AdditionalChange>,
    /// Security considerations.
    pub security_notes: Vec<String>,
    /// How to roll the fix back.
    pub rollback_plan: String,
}

/// Reviewer confidence in a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// High.
    High,
    /// Low.
    Low,
    /// Medium. Also used for values the model invents.
    #[default]
    #[serde(other)]
    Medium,
}

/// Result of the `validate` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationReport {
    /// Whether the fix addresses the finding.
    pub is_valid: bool,
    /// Problems found in the fix.
    pub issues: Vec<String>,
    /// Suggested improvements.
    pub suggestions: Vec<String>,
    /// Score from 1 to 10.
    pub security_score: u32,
    /// Reviewer confidence.
    pub confidence: Confidence,
}

/// Result of the `apply` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyPlan {
    /// Shell commands to apply the fix.
    pub commands: Vec<String>,
    /// Pull request title.
    pub pr_title: String,
    /// Pull request body in Markdown.
    pub pr_body: String,
    /// Commit message.
    pub commit_message: String,
    /// Labels.
    pub labels: Vec<String>,
    /// Suggested reviewers.
    pub reviewers: Vec<String>,
}

impl ApplyPlan {
    /// Builds the GitHub quick pull request URL for this plan.
    ///
    /// Falls back to `Fix: <title>` and the finding description when the
    /// plan carries no title or body.
    pub fn pull_request_url(
        &self,
        repo_url: &str,
        branch: &str,
        vulnerability: &Vulnerability,
    ) -> String {
        let title = if self.pr_title.is_empty() {
            format!("Fix: {}", vulnerability.title)
        } else {
            self.pr_title.clone()
        };
        let body = if self.pr_body.is_empty() {
            vulnerability.description.as_str()
        } else {
            self.pr_body.as_str()
        };

        format!(
            "{}/compare/{branch}...{branch}?quick_pull=1&title={}&body={}",
            repo_url.trim_end_matches('/'),
            urlencoding::encode(&title),
            urlencoding::encode(body),
        )
    }

    /// Builds the GitHub web editor URL for the vulnerable file.
    pub fn edit_url(repo_url: &str, branch: &str, vulnerability: &Vulnerability) -> String {
        format!(
            "{}/edit/{}/{}",
            repo_url.trim_end_matches('/'),
            branch,
            vulnerability.file.trim_start_matches('/')
        )
    }

    /// Returns the commands joined by newlines, ready for the clipboard.
    pub fn script(&self) -> String {
        self.commands.join("\n")
    }
}
