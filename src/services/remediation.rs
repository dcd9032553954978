//! Auto-remediation service and the generate/validate/apply workflow.

use serde::de::DeserializeOwned;
use std::fmt;
use tracing::instrument;

use super::FunctionClient;
use crate::errors::{DevGuardError, DevGuardResult};
use crate::types::{
    ApplyPlan, RemediationAction, RemediationContext, RemediationEnvelope, RemediationPlan,
    RemediationRequest, ValidationReport, Vulnerability,
};

/// Endpoint name.
pub(crate) const FUNCTION: &str = "auto-remediation";
const FALLBACK_MESSAGE: &str = "Failed to generate remediation";

/// Remediation service.
#[derive(Debug, Clone)]
pub struct RemediationService {
    functions: FunctionClient,
}

impl RemediationService {
    pub(crate) fn new(functions: FunctionClient) -> Self {
        Self { functions }
    }

    /// Generates an enhanced fix with steps, tests and a rollback plan.
    #[instrument(skip(self, vulnerability), fields(title = %vulnerability.title))]
    pub async fn generate(&self, vulnerability: &Vulnerability) -> DevGuardResult<RemediationPlan> {
        self.call(vulnerability, RemediationAction::Generate, None).await
    }

    /// Reviews `vulnerability.fixed_code` against the finding.
    #[instrument(skip(self, vulnerability), fields(title = %vulnerability.title))]
    pub async fn validate(
        &self,
        vulnerability: &Vulnerability,
    ) -> DevGuardResult<ValidationReport> {
        self.call(vulnerability, RemediationAction::Validate, None).await
    }

    /// Produces the commands and pull request text that apply the fix.
    #[instrument(
        skip(self, vulnerability, context),
        fields(title = %vulnerability.title, branch = context.branch_or_default())
    )]
    pub async fn apply(
        &self,
        vulnerability: &Vulnerability,
        context: &RemediationContext,
    ) -> DevGuardResult<ApplyPlan> {
        self.call(vulnerability, RemediationAction::Apply, Some(context))
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        vulnerability: &Vulnerability,
        action: RemediationAction,
        context: Option<&RemediationContext>,
    ) -> DevGuardResult<T> {
        let request = RemediationRequest {
            vulnerability,
            action,
            context,
        };
        let envelope: RemediationEnvelope<T> = self
            .functions
            .json(FUNCTION, FALLBACK_MESSAGE, &request)
            .await?;

        if let Some(message) = envelope.error.filter(|m| !m.is_empty()) {
            return Err(DevGuardError::generation_failed(message));
        }

        envelope.result.ok_or_else(|| {
            tracing::warn!(action = action.as_str(), "Remediation response has no result");
            DevGuardError::generation_failed(FALLBACK_MESSAGE)
        })
    }
}

/// Step of the remediation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowStep {
    /// Not running. Also the state after a failure.
    #[default]
    Idle,
    /// Generating the enhanced fix.
    Generating,
    /// Validating the enhanced fix.
    Validating,
    /// Generating the apply plan.
    Applying,
    /// All three results are available.
    Ready,
}

impl WorkflowStep {
    /// Progress percentage reported when the step is entered.
    pub fn progress(self) -> u8 {
        match self {
            WorkflowStep::Idle => 0,
            WorkflowStep::Generating => 10,
            WorkflowStep::Validating => 40,
            WorkflowStep::Applying => 70,
            WorkflowStep::Ready => 100,
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::Idle => "idle",
            WorkflowStep::Generating => "generating",
            WorkflowStep::Validating => "validating",
            WorkflowStep::Applying => "applying",
            WorkflowStep::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Results of a completed workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationOutcome {
    /// The enhanced fix.
    pub plan: RemediationPlan,
    /// Review of the enhanced fix.
    pub validation: ValidationReport,
    /// Commands and pull request text.
    pub apply: ApplyPlan,
    /// Repository context the apply plan was generated for.
    pub context: RemediationContext,
}

impl RemediationOutcome {
    /// Quick pull request URL for the generated plan.
    pub fn pull_request_url(&self, vulnerability: &Vulnerability) -> Option<String> {
        let repo_url = self.context.repository.as_deref()?;
        Some(
            self.apply
                .pull_request_url(repo_url, self.context.branch_or_default(), vulnerability),
        )
    }
}

/// Runs generate, validate and apply in sequence.
#[derive(Debug)]
pub struct RemediationWorkflow {
    service: RemediationService,
    step: WorkflowStep,
    progress: u8,
}

impl RemediationWorkflow {
    /// Creates an idle workflow.
    pub fn new(service: RemediationService) -> Self {
        Self {
            service,
            step: WorkflowStep::Idle,
            progress: 0,
        }
    }

    /// Current step.
    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    /// Last reported progress percentage.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Runs the workflow for `vulnerability`.
    ///
    /// Validation and apply both receive the finding with `fixed_code`
    /// replaced by the generated enhanced fix. `on_progress` is called on
    /// every step change. A failure at any step returns the workflow to
    /// [`WorkflowStep::Idle`].
    pub async fn run<F>(
        &mut self,
        vulnerability: &Vulnerability,
        repository: impl Into<String>,
        branch: Option<String>,
        mut on_progress: F,
    ) -> DevGuardResult<RemediationOutcome>
    where
        F: FnMut(WorkflowStep, u8),
    {
        let context = RemediationContext::new(repository, branch);
        let result = self
            .run_steps(vulnerability, context, &mut on_progress)
            .await;

        if let Err(e) = &result {
            tracing::warn!(step = %self.step, error = %e, "Remediation workflow failed");
            self.step = WorkflowStep::Idle;
            on_progress(self.step, self.progress);
        }
        result
    }

    async fn run_steps<F>(
        &mut self,
        vulnerability: &Vulnerability,
        context: RemediationContext,
        on_progress: &mut F,
    ) -> DevGuardResult<RemediationOutcome>
    where
        F: FnMut(WorkflowStep, u8),
    {
        self.enter(WorkflowStep::Generating, on_progress);
        let plan = self.service.generate(vulnerability).await?;
        let enhanced = vulnerability.with_fixed_code(plan.enhanced_fix.clone());

        self.enter(WorkflowStep::Validating, on_progress);
        let validation = self.service.validate(&enhanced).await?;

        self.enter(WorkflowStep::Applying, on_progress);
        let apply = self.service.apply(&enhanced, &context).await?;

        self.enter(WorkflowStep::Ready, on_progress);
        tracing::info!(valid = validation.is_valid, "Remediation workflow ready");

        Ok(RemediationOutcome {
            plan,
            validation,
            apply,
            context,
        })
    }

    fn enter<F: FnMut(WorkflowStep, u8)>(&mut self, step: WorkflowStep, on_progress: &mut F) {
        self.step = step;
        self.progress = step.progress();
        on_progress(step, self.progress);
    }
}
