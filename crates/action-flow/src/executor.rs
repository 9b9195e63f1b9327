//! Workflow orchestrator implementation

use crate::errors::{FlowError, StepFailure};
use crate::pause::{PausePoint, StdinPause};
use crate::report::{ReportGenerator, SummaryReportGenerator};
use crate::tracker::StepTracker;
use crate::types::*;
use action_gate::{
    DefaultVerificationResolver, MatchedCondition, VerificationOutcome, VerificationResolver,
};
use action_locator::{DefaultElementResolver, ElementResolver};
use action_primitives::{
    BoundedWait, BrowserDriver, DefaultInteractionExecutor, EvidenceStore, InteractionExecutor,
    MarkerStyle,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Evidence label of the capture taken after a completed run
pub const FINAL_SUCCESS_LABEL: &str = "final_success";

/// Evidence label of the capture taken after an aborted run
pub const FINAL_ERROR_LABEL: &str = "final_error";

/// Step currently executing, kept outside the step future so a panic can
/// still be attributed to it
#[derive(Debug, Clone)]
struct InFlight {
    step: String,
    started_at: DateTime<Utc>,
    attempt: u32,
}

/// What a passing step attempt produced
#[derive(Debug, Default)]
struct StepSuccess {
    evidence_path: Option<PathBuf>,
    verified_by: Option<MatchedCondition>,
}

/// Runs one workflow against one exclusively owned browser session
///
/// `run` consumes the orchestrator: the session is released exactly once, on
/// every exit path, after the report has been written.
pub struct WorkflowOrchestrator {
    driver: Box<dyn BrowserDriver>,
    resolver: Arc<dyn ElementResolver>,
    interactor: Arc<dyn InteractionExecutor>,
    verifier: Arc<dyn VerificationResolver>,
    pause: Arc<dyn PausePoint>,
    reporter: Arc<dyn ReportGenerator>,
}

impl WorkflowOrchestrator {
    /// Create an orchestrator with the default engine services.
    ///
    /// Pause points wait for Enter on stdin until replaced.
    pub fn new(driver: Box<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            resolver: Arc::new(DefaultElementResolver::default()),
            interactor: Arc::new(DefaultInteractionExecutor::default()),
            verifier: Arc::new(DefaultVerificationResolver::default()),
            pause: Arc::new(StdinPause::new()),
            reporter: Arc::new(SummaryReportGenerator::new()),
        }
    }

    /// Rebuild the default services with the given polling and marker settings
    pub fn with_engine_settings(mut self, waiter: BoundedWait, marker: MarkerStyle) -> Self {
        self.resolver = Arc::new(DefaultElementResolver::new(waiter));
        self.interactor = Arc::new(DefaultInteractionExecutor::new(marker, waiter));
        self.verifier = Arc::new(DefaultVerificationResolver::new(waiter));
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ElementResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_interaction_executor(mut self, interactor: Arc<dyn InteractionExecutor>) -> Self {
        self.interactor = interactor;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn VerificationResolver>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_pause_point(mut self, pause: Arc<dyn PausePoint>) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_report_generator(mut self, reporter: Arc<dyn ReportGenerator>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Execute `workflow`, writing evidence and the report under `reports_root`.
    ///
    /// Returns `Ok` for both completed and aborted runs; inspect
    /// [`RunSummary::outcome`] or call [`RunSummary::ensure_completed`].
    /// `Err` means the run could not be set up or its report not written.
    pub async fn run(self, workflow: &Workflow, reports_root: &Path) -> Result<RunSummary, FlowError> {
        info!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            session = %self.driver.session_id(),
            "Starting workflow"
        );

        if let Err(err) = workflow.validate() {
            error!("Workflow rejected: {}", err);
            self.release().await;
            return Err(err);
        }

        // Created
        let evidence = match EvidenceStore::create(reports_root, &workflow.label) {
            Ok(store) => store,
            Err(err) => {
                error!("Cannot allocate report directory: {}", err);
                self.release().await;
                return Err(FlowError::ReportDir(err));
            }
        };
        let mut run = WorkflowRun::new(workflow, evidence.dir().to_path_buf());
        info!(
            run_id = %run.run_id,
            report_dir = %run.report_dir.display(),
            "Run created"
        );

        // Running -> Completed | Aborted
        let outcome = self.drive(&mut run, &evidence).await;

        // Finalized: report first, then release
        let report = self.reporter.generate(&run).await;
        if let Err(err) = &report {
            error!(run_id = %run.run_id, "Report generation failed: {}", err);
        }
        advance(&mut run, RunState::Finalized);
        self.release().await;
        let report = report?;

        match &outcome {
            RunOutcome::Completed => info!(
                run_id = %run.run_id,
                passed = run.tracker().passed(),
                "Workflow completed"
            ),
            RunOutcome::Aborted { step, cause } => warn!(
                run_id = %run.run_id,
                step = %step,
                "Workflow aborted: {}",
                cause
            ),
        }

        Ok(RunSummary {
            run_id: run.run_id.clone(),
            state: run.state(),
            outcome,
            report_dir: run.report_dir.clone(),
            results: run.results().to_vec(),
            report,
        })
    }

    /// Run every step, then take the run-final capture.
    async fn drive(&self, run: &mut WorkflowRun, evidence: &EvidenceStore) -> RunOutcome {
        advance(run, RunState::Running);

        let steps = run.steps.clone();
        let mut in_flight: Option<InFlight> = None;
        let result = AssertUnwindSafe(self.run_steps(
            &steps,
            run.tracker_mut(),
            evidence,
            &mut in_flight,
        ))
        .catch_unwind()
        .await;

        let outcome = match result {
            Ok(Ok(())) => RunOutcome::Completed,
            Ok(Err((step, cause))) => RunOutcome::Aborted { step, cause },
            Err(payload) => {
                let cause = StepFailure::Defect(format!("panic: {}", panic_message(&*payload)));
                error!("Unexpected defect during run: {}", cause);
                let current = in_flight.unwrap_or_else(|| InFlight {
                    step: "<engine>".to_string(),
                    started_at: Utc::now(),
                    attempt: 1,
                });
                run.tracker_mut().record(StepResult::fail(
                    &current.step,
                    current.started_at,
                    current.attempt,
                    &cause,
                ));
                RunOutcome::Aborted {
                    step: current.step,
                    cause,
                }
            }
        };

        let label = if outcome.is_completed() {
            FINAL_SUCCESS_LABEL
        } else {
            FINAL_ERROR_LABEL
        };
        match AssertUnwindSafe(evidence.capture(self.driver.as_ref(), label))
            .catch_unwind()
            .await
        {
            Ok(Ok(path)) => debug!(path = %path.display(), "Final evidence captured"),
            Ok(Err(err)) => warn!("Final evidence capture failed: {}", err),
            Err(payload) => warn!(
                "Final evidence capture panicked: {}",
                panic_message(&*payload)
            ),
        }

        if let Err(err) = run.finish(outcome.clone()) {
            error!("{}", err);
        }
        outcome
    }

    /// Execute steps in declaration order until the first unrecoverable failure.
    async fn run_steps(
        &self,
        steps: &[StepSpec],
        tracker: &mut StepTracker,
        evidence: &EvidenceStore,
        in_flight: &mut Option<InFlight>,
    ) -> Result<(), (String, StepFailure)> {
        for (index, step) in steps.iter().enumerate() {
            let mut attempt = 1;
            loop {
                let started_at = Utc::now();
                *in_flight = Some(InFlight {
                    step: step.name.clone(),
                    started_at,
                    attempt,
                });
                info!(
                    step = %step.name,
                    kind = step.kind.name(),
                    position = index + 1,
                    total = steps.len(),
                    attempt = attempt,
                    "Running step"
                );

                let result = self.run_step(step, evidence).await;
                *in_flight = None;

                match result {
                    Ok(success) => {
                        tracker.record(
                            StepResult::pass(&step.name, started_at, attempt, success.evidence_path)
                                .with_verified_by(success.verified_by),
                        );
                        info!(step = %step.name, "Step passed");
                        break;
                    }
                    Err(failure) => {
                        warn!(step = %step.name, attempt = attempt, "Step failed: {}", failure);
                        tracker.record(StepResult::fail(&step.name, started_at, attempt, &failure));
                        if step.retry.should_retry(attempt, &failure) {
                            let backoff = step.retry.backoff(attempt);
                            info!(
                                step = %step.name,
                                backoff_ms = backoff.as_millis() as u64,
                                "Retrying step"
                            );
                            sleep(backoff).await;
                            attempt += 1;
                            continue;
                        }
                        return Err((step.name.clone(), failure));
                    }
                }
            }
        }
        Ok(())
    }

    /// One attempt of one step: act (by kind), then verify if requested.
    async fn run_step(
        &self,
        step: &StepSpec,
        evidence: &EvidenceStore,
    ) -> Result<StepSuccess, StepFailure> {
        let driver = self.driver.as_ref();
        let mut success = StepSuccess::default();

        match &step.kind {
            StepKind::Navigate { url, .. } => {
                driver.navigate(url).await.map_err(|err| {
                    StepFailure::Defect(format!("Failed to navigate to {}: {}", url, err))
                })?;
                let post_wait = step.post_action_wait();
                if !post_wait.is_zero() {
                    sleep(post_wait).await;
                }
                success.evidence_path = Some(evidence.capture(driver, &step.evidence_label).await?);
            }
            StepKind::Interact { locator, action, .. } => {
                let resolved = self.resolver.resolve(driver, locator).await?;
                let report = self
                    .interactor
                    .execute(
                        driver,
                        &resolved.element,
                        action,
                        &step.evidence_label,
                        evidence,
                        step.post_action_wait(),
                    )
                    .await?;
                success.evidence_path = Some(report.evidence_path);
            }
            StepKind::Verify { .. } => {}
            StepKind::Pause { prompt } => {
                info!(step = %step.name, "Paused, waiting for resume");
                self.pause.await_resume(prompt).await?;
            }
        }

        if let Some(spec) = step.kind.verification() {
            match self
                .verifier
                .verify(driver, spec, evidence, &step.evidence_label)
                .await?
            {
                VerificationOutcome::Matched {
                    which,
                    evidence_path,
                    ..
                } => {
                    success.evidence_path = Some(evidence_path);
                    success.verified_by = Some(which);
                }
                VerificationOutcome::TimedOut { waited_ms } => {
                    return Err(StepFailure::VerificationTimedOut { waited_ms });
                }
            }
        }

        Ok(success)
    }

    /// Release the browser session; failures are logged only.
    async fn release(self) {
        let session = self.driver.session_id().clone();
        match self.driver.close().await {
            Ok(()) => info!(session = %session, "Browser session released"),
            Err(err) => warn!(session = %session, "Browser session release failed: {}", err),
        }
    }
}

fn advance(run: &mut WorkflowRun, next: RunState) {
    let from = run.state();
    match run.transition(next) {
        Ok(()) => debug!(run_id = %run.run_id, "Run state {} -> {}", from, next),
        Err(err) => error!(run_id = %run.run_id, "{}", err),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pause::ImmediateResume;
    use crate::report::SUMMARY_TEXT_FILE;
    use crate::RetryPolicy;
    use action_gate::{Condition, VerificationSpec};
    use action_locator::Locator;
    use action_primitives::testing::{DriverCall, ScriptedDriver};
    use action_primitives::{Action, DriverErrorKind, Selector};
    use std::time::Duration;

    fn orchestrator(driver: &ScriptedDriver) -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(Box::new(driver.clone()))
            .with_engine_settings(
                BoundedWait::default(),
                MarkerStyle {
                    border_css: "3px solid red".to_string(),
                    hold: Duration::ZERO,
                },
            )
            .with_pause_point(Arc::new(ImmediateResume))
    }

    fn click(name: &str, css: &str) -> StepSpec {
        StepSpec::interact(name, Locator::new(Selector::css(css), 500), Action::Click)
    }

    #[tokio::test(start_paused = true)]
    async fn completed_run_captures_final_success_and_releases_once() {
        let root = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new().with_element(Selector::css("#add"));
        let workflow = Workflow::new("Add", "Add")
            .with_step(StepSpec::navigate("Open", "https://example.test/list"))
            .with_step(click("Click add", "#add"));

        let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.state, RunState::Finalized);
        assert!(summary.ensure_completed().is_ok());
        assert_eq!(driver.close_count(), 1);
        let shots = driver.screenshots();
        assert_eq!(shots.len(), 3);
        assert!(shots[2].ends_with("03_final_success.png"));
        assert!(summary.report_dir.join(SUMMARY_TEXT_FILE).exists());
        assert_eq!(driver.significant_calls().last(), Some(&DriverCall::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_aborts_with_locator_not_found() {
        let root = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let workflow = Workflow::new("Add", "Add")
            .with_step(click("Click add", "#add"))
            .with_step(click("Click save", "#save"));

        let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.results.len(), 1);
        assert_eq!(
            summary.results[0]
                .error_message
                .as_deref()
                .map(|m| m.starts_with("LocatorNotFound")),
            Some(true)
        );
        match summary.ensure_completed().unwrap_err() {
            FlowError::WorkflowAborted { step, cause } => {
                assert_eq!(step, "Click add");
                assert_eq!(cause.kind(), "locator_not_found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(driver.screenshots()[0].ends_with("01_final_error.png"));
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_panic_still_reports_and_releases() {
        let root = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new()
            .with_element(Selector::css("#crash"))
            .panicking_action(Selector::css("#crash"));
        let workflow = Workflow::new("Crash", "Crash")
            .with_step(click("Boom", "#crash"))
            .with_step(click("Never", "#never"));

        let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].step_name, "Boom");
        assert!(summary.results[0]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("panic: scripted driver crash"));
        assert_eq!(summary.report.failed.len(), 1);
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_appends_every_attempt() {
        let root = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new()
            .with_element(Selector::css("#save"))
            .with_element_after(Selector::css(".el-message__content"), Duration::from_millis(1500));
        let workflow = Workflow::new("Save", "Save").with_step(
            click("Save", "#save")
                .with_verification(VerificationSpec::new(
                    Condition::ElementPresent(Selector::css(".el-message__content")),
                    1000,
                ))
                .with_retry(RetryPolicy::Retry {
                    max_attempts: 3,
                    backoff_ms: 100,
                }),
        );

        let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

        assert!(summary.is_success());
        let statuses: Vec<(StepStatus, u32)> = summary
            .results
            .iter()
            .map(|r| (r.status, r.attempt))
            .collect();
        assert_eq!(
            statuses,
            vec![(StepStatus::Fail, 1), (StepStatus::Pass, 2)]
        );
        assert_eq!(summary.results[1].verified_by, Some(MatchedCondition::Primary));
    }

    #[tokio::test]
    async fn invalid_workflow_is_rejected_but_session_released() {
        let root = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let workflow = Workflow::new("Empty", "Empty");

        let err = orchestrator(&driver).run(&workflow, root.path()).await.unwrap_err();

        assert!(matches!(err, FlowError::InvalidWorkflow(_)));
        assert_eq!(driver.close_count(), 1);
        assert!(driver.screenshots().is_empty());
    }

    #[tokio::test]
    async fn action_rejection_is_reported_not_thrown() {
        let root = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new()
            .with_element(Selector::css("#submit"))
            .failing_action(Selector::css("#submit"), DriverErrorKind::NotInteractable);
        let workflow = Workflow::new("Submit", "Submit").with_step(click("Submit", "#submit"));

        let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

        assert_eq!(
            summary.results[0].error_message.as_deref(),
            Some("ActionFailed: Failed to click element: not interactable: css:#submit rejected click")
        );
        assert_eq!(summary.report.failed.len(), 1);
    }
}
