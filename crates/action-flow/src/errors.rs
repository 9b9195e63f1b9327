//! Flow execution error types

use action_gate::GateError;
use action_locator::LocatorError;
use action_primitives::ActionError;
use thiserror::Error;

/// Why a single step failed
///
/// Recorded on the failing `StepResult` and carried by `WorkflowAborted`.
#[derive(Debug, Error, Clone)]
pub enum StepFailure {
    /// No selector of the step's locator matched within budget
    #[error("LocatorNotFound: {0}")]
    LocatorNotFound(LocatorError),

    /// The resolved element rejected the interaction
    #[error("ActionFailed: {0}")]
    ActionFailed(ActionError),

    /// Neither the primary nor any fallback condition matched in time
    #[error("VerificationTimedOut: no success condition matched within {waited_ms} ms")]
    VerificationTimedOut { waited_ms: u64 },

    /// The resume signal of a pause point can never arrive
    #[error("PauseInterrupted: {0}")]
    PauseInterrupted(String),

    /// Unexpected condition: driver crash, failed capture, panic
    #[error("Defect: {0}")]
    Defect(String),
}

impl StepFailure {
    /// Short machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            StepFailure::LocatorNotFound(_) => "locator_not_found",
            StepFailure::ActionFailed(_) => "action_failed",
            StepFailure::VerificationTimedOut { .. } => "verification_timed_out",
            StepFailure::PauseInterrupted(_) => "pause_interrupted",
            StepFailure::Defect(_) => "defect",
        }
    }

    /// Whether an explicit retry policy may run the step again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepFailure::ActionFailed(_) | StepFailure::VerificationTimedOut { .. }
        )
    }
}

impl From<LocatorError> for StepFailure {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::Driver(cause) if !cause.is_transient() => {
                StepFailure::Defect(format!("driver failed during lookup: {}", cause))
            }
            other => StepFailure::LocatorNotFound(other),
        }
    }
}

impl From<ActionError> for StepFailure {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::ActionFailed { .. } | ActionError::InvalidAction(_) => {
                StepFailure::ActionFailed(err)
            }
            other => StepFailure::Defect(other.to_string()),
        }
    }
}

impl From<GateError> for StepFailure {
    fn from(err: GateError) -> Self {
        StepFailure::Defect(err.to_string())
    }
}

/// Raised when a pause point can no longer be resumed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PauseInterrupted(pub String);

impl From<PauseInterrupted> for StepFailure {
    fn from(err: PauseInterrupted) -> Self {
        StepFailure::PauseInterrupted(err.0)
    }
}

/// Flow execution errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// Workflow failed structural validation before the run started
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A step failed and the run was aborted
    #[error("Workflow aborted at step '{step}': {cause}")]
    WorkflowAborted { step: String, cause: StepFailure },

    /// Run state machine violated
    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Report directory could not be allocated
    #[error("Report directory error: {0}")]
    ReportDir(#[from] ActionError),

    /// Report document could not be written or read
    #[error("Report error: {0}")]
    Report(String),
}
