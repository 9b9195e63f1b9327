//! Core types for flow orchestration

use crate::errors::{FlowError, StepFailure};
use crate::report::ReportDocument;
use crate::strategies::RetryPolicy;
use crate::tracker::StepTracker;
use action_gate::{MatchedCondition, VerificationSpec};
use action_locator::Locator;
use action_primitives::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uiflow_core_types::RunId;

/// Named, ordered sequence of steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Label used for the report directory name
    pub label: String,

    /// Steps in execution order
    pub steps: Vec<StepSpec>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    /// Structural checks run before a session is touched
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.name.trim().is_empty() {
            return Err(FlowError::InvalidWorkflow("workflow name is empty".to_string()));
        }
        if self.label.trim().is_empty() {
            return Err(FlowError::InvalidWorkflow("workflow label is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(FlowError::InvalidWorkflow(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|reason| {
                FlowError::InvalidWorkflow(format!(
                    "step {} ('{}'): {}",
                    index + 1,
                    step.name,
                    reason
                ))
            })?;
        }
        Ok(())
    }

    /// Sum of bounded step budgets; pause points are excluded
    pub fn worst_case_wait(&self) -> Duration {
        self.steps
            .iter()
            .filter_map(StepSpec::worst_case_wait)
            .sum()
    }
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Load a URL, settle, capture
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<VerificationSpec>,
    },

    /// Locate an element and act on it
    Interact {
        locator: Locator,
        action: Action,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<VerificationSpec>,
    },

    /// Only run the verification resolver
    Verify { verification: VerificationSpec },

    /// Block until an external resume signal
    Pause { prompt: String },
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Navigate { .. } => "navigate",
            StepKind::Interact { .. } => "interact",
            StepKind::Verify { .. } => "verify",
            StepKind::Pause { .. } => "pause",
        }
    }

    pub fn verification(&self) -> Option<&VerificationSpec> {
        match self {
            StepKind::Navigate { verification, .. } | StepKind::Interact { verification, .. } => {
                verification.as_ref()
            }
            StepKind::Verify { verification } => Some(verification),
            StepKind::Pause { .. } => None,
        }
    }
}

/// One step of a workflow, immutable once a run starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name as it appears in the report
    pub name: String,

    #[serde(flatten)]
    pub kind: StepKind,

    /// Settle time between the action and its capture
    #[serde(default)]
    pub post_action_wait_ms: u64,

    /// Label of this step's evidence files
    pub evidence_label: String,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl StepSpec {
    fn new(name: impl Into<String>, kind: StepKind) -> Self {
        let name = name.into();
        Self {
            evidence_label: name.clone(),
            name,
            kind,
            post_action_wait_ms: 0,
            retry: RetryPolicy::None,
        }
    }

    pub fn navigate(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Navigate {
                url: url.into(),
                verification: None,
            },
        )
    }

    pub fn interact(name: impl Into<String>, locator: Locator, action: Action) -> Self {
        Self::new(
            name,
            StepKind::Interact {
                locator,
                action,
                verification: None,
            },
        )
    }

    pub fn verify(name: impl Into<String>, verification: VerificationSpec) -> Self {
        Self::new(name, StepKind::Verify { verification })
    }

    pub fn pause(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Pause {
                prompt: prompt.into(),
            },
        )
    }

    /// Attach a verification to a navigate or interact step
    pub fn with_verification(mut self, spec: VerificationSpec) -> Self {
        match &mut self.kind {
            StepKind::Navigate { verification, .. } | StepKind::Interact { verification, .. } => {
                *verification = Some(spec);
            }
            StepKind::Verify { verification } => *verification = spec,
            StepKind::Pause { .. } => {}
        }
        self
    }

    pub fn with_evidence_label(mut self, label: impl Into<String>) -> Self {
        self.evidence_label = label.into();
        self
    }

    pub fn with_post_action_wait(mut self, wait_ms: u64) -> Self {
        self.post_action_wait_ms = wait_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn post_action_wait(&self) -> Duration {
        Duration::from_millis(self.post_action_wait_ms)
    }

    pub fn is_pause(&self) -> bool {
        matches!(self.kind, StepKind::Pause { .. })
    }

    /// Longest one attempt of this step can block; `None` for pause points
    pub fn worst_case_wait(&self) -> Option<Duration> {
        let verification = self
            .kind
            .verification()
            .map(VerificationSpec::worst_case_wait)
            .unwrap_or_default();
        match &self.kind {
            StepKind::Pause { .. } => None,
            StepKind::Verify { .. } => Some(verification),
            StepKind::Navigate { .. } => Some(self.post_action_wait() + verification),
            StepKind::Interact { locator, .. } => {
                Some(locator.worst_case_wait() + self.post_action_wait() + verification)
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("step name is empty".to_string());
        }
        if self.evidence_label.trim().is_empty() {
            return Err("evidence label is empty".to_string());
        }
        self.retry.validate()?;
        match &self.kind {
            StepKind::Navigate { url, .. } if url.trim().is_empty() => {
                return Err("navigate URL is empty".to_string());
            }
            StepKind::Interact { locator, action, .. } => {
                locator.validate()?;
                action.validate()?;
            }
            _ => {}
        }
        if let Some(verification) = self.kind.verification() {
            verification.validate().map_err(|err| err.to_string())?;
        }
        Ok(())
    }
}

/// Step outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pass,
    Fail,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pass => f.write_str("PASS"),
            StepStatus::Fail => f.write_str("FAIL"),
        }
    }
}

/// Result of one step invocation, never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// 1-based attempt number under the step's retry policy
    pub attempt: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_path: Option<PathBuf>,

    /// Which verification condition confirmed the step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<MatchedCondition>,
}

impl StepResult {
    pub fn pass(
        step_name: impl Into<String>,
        started_at: DateTime<Utc>,
        attempt: u32,
        evidence_path: Option<PathBuf>,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Pass,
            started_at,
            finished_at: Utc::now(),
            attempt,
            error_message: None,
            evidence_path,
            verified_by: None,
        }
    }

    pub fn with_verified_by(mut self, which: Option<MatchedCondition>) -> Self {
        self.verified_by = which;
        self
    }

    pub fn fail(
        step_name: impl Into<String>,
        started_at: DateTime<Utc>,
        attempt: u32,
        failure: &StepFailure,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Fail,
            started_at,
            finished_at: Utc::now(),
            attempt,
            error_message: Some(failure.to_string()),
            evidence_path: None,
            verified_by: None,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == StepStatus::Pass
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Run lifecycle: Created → Running → (Completed | Aborted) → Finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    Running,
    Completed,
    Aborted,
    Finalized,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Created, RunState::Running)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Aborted)
                | (RunState::Completed, RunState::Finalized)
                | (RunState::Aborted, RunState::Finalized)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Created => "created",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
            RunState::Finalized => "finalized",
        };
        f.write_str(label)
    }
}

/// How a run left the Running state
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed,
    Aborted { step: String, cause: StepFailure },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// One execution of a workflow against one session
///
/// Owned exclusively by the orchestrator; results are appended through the
/// step tracker only.
#[derive(Debug)]
pub struct WorkflowRun {
    pub run_id: RunId,
    pub workflow: String,
    pub label: String,
    pub report_dir: PathBuf,
    pub steps: Vec<StepSpec>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    state: RunState,
    outcome: Option<RunOutcome>,
    tracker: StepTracker,
}

impl WorkflowRun {
    pub fn new(workflow: &Workflow, report_dir: PathBuf) -> Self {
        Self {
            run_id: RunId::new(),
            workflow: workflow.name.clone(),
            label: workflow.label.clone(),
            report_dir,
            steps: workflow.steps.clone(),
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Created,
            outcome: None,
            tracker: StepTracker::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn transition(&mut self, next: RunState) -> Result<(), FlowError> {
        if !self.state.can_transition_to(next) {
            return Err(FlowError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Leave Running with the given outcome
    pub fn finish(&mut self, outcome: RunOutcome) -> Result<(), FlowError> {
        let next = if outcome.is_completed() {
            RunState::Completed
        } else {
            RunState::Aborted
        };
        self.transition(next)?;
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn tracker(&self) -> &StepTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut StepTracker {
        &mut self.tracker
    }

    pub fn results(&self) -> &[StepResult] {
        self.tracker.snapshot()
    }
}

/// What the orchestrator hands back once a run is finalized
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    pub state: RunState,
    pub outcome: RunOutcome,
    pub report_dir: PathBuf,
    pub results: Vec<StepResult>,
    pub report: ReportDocument,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Finalized && self.outcome.is_completed()
    }

    /// Convert an aborted run into `WorkflowAborted`
    pub fn ensure_completed(&self) -> Result<(), FlowError> {
        match &self.outcome {
            RunOutcome::Completed => Ok(()),
            RunOutcome::Aborted { step, cause } => Err(FlowError::WorkflowAborted {
                step: step.clone(),
                cause: cause.clone(),
            }),
        }
    }
}
