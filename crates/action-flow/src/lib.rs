//! Workflow orchestration layer
//!
//! Composes an ordered list of steps into one run against a single browser
//! session: locate → interact → verify → track for every step, a run-level
//! state machine, a report written on every exit path and an unconditional
//! release of the session.

pub mod errors;
pub mod executor;
pub mod pause;
pub mod report;
pub mod strategies;
pub mod tracker;
pub mod types;

pub use errors::{FlowError, PauseInterrupted, StepFailure};
pub use executor::{WorkflowOrchestrator, FINAL_ERROR_LABEL, FINAL_SUCCESS_LABEL};
pub use pause::{ChannelPause, ImmediateResume, PausePoint, ResumeHandle, StdinPause};
pub use report::{
    ReportDocument, ReportEntry, ReportGenerator, SummaryReportGenerator, SUMMARY_JSON_FILE,
    SUMMARY_TEXT_FILE,
};
pub use strategies::RetryPolicy;
pub use tracker::StepTracker;
pub use types::{
    RunOutcome, RunState, RunSummary, StepKind, StepResult, StepSpec, StepStatus, Workflow,
    WorkflowRun,
};
