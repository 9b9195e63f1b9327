//! End-to-end runs of the orchestrator against the scripted driver

use action_flow::*;
use action_gate::{Condition, MatchedCondition, VerificationSpec};
use action_locator::Locator;
use action_primitives::testing::{DriverCall, ScriptedDriver};
use action_primitives::{Action, ActionKind, BoundedWait, DriverErrorKind, MarkerStyle, Selector};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn orchestrator(driver: &ScriptedDriver) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new(Box::new(driver.clone()))
        .with_engine_settings(
            BoundedWait::new(Duration::from_millis(50)),
            MarkerStyle {
                border_css: "3px solid red".to_string(),
                hold: Duration::ZERO,
            },
        )
        .with_pause_point(Arc::new(ImmediateResume))
}

fn click(name: &str, css: &str) -> StepSpec {
    StepSpec::interact(name, Locator::new(Selector::css(css), 1000), Action::Click)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test(start_paused = true)]
async fn fallback_condition_confirms_a_step() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new()
        .with_element(Selector::css("#add"))
        .with_element_after(
            Selector::class_name("el-message__content"),
            Duration::from_millis(1200),
        );
    let workflow = Workflow::new("Add supplier", "Add-Supplier")
        .with_step(StepSpec::navigate("Open list", "https://admin.example.test/suppliers"))
        .with_step(click("Click add", "#add"))
        .with_step(
            StepSpec::verify(
                "Confirm saved",
                VerificationSpec::new(
                    Condition::ElementPresent(Selector::xpath("/html/body/div[5]")),
                    1000,
                )
                .with_fallback(Condition::ElementPresent(Selector::class_name(
                    "el-message__content",
                )))
                .with_fallback_timeout(2000),
            )
            .with_evidence_label("add_supplier_success"),
        );

    let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.results.len(), 3);
    let confirm = &summary.results[2];
    assert!(confirm.is_pass());
    assert_eq!(confirm.verified_by, Some(MatchedCondition::Fallback(0)));

    let files = file_names(&summary.report_dir);
    assert!(files.contains(&"03_add_supplier_success_fallback_0.png".to_string()));
    assert!(!files.iter().any(|f| f.contains("add_supplier_success_primary")));
    assert!(files.contains(&"04_final_success.png".to_string()));
    assert!(files.contains(&SUMMARY_TEXT_FILE.to_string()));
    assert!(files.contains(&SUMMARY_JSON_FILE.to_string()));
}

#[tokio::test(start_paused = true)]
async fn failing_step_aborts_the_rest_and_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new()
        .with_element(Selector::css("#first"))
        .with_element(Selector::css("#second"))
        .with_element(Selector::css("#fourth"))
        .failing_action(Selector::css("#second"), DriverErrorKind::NotInteractable);
    let workflow = Workflow::new("Four steps", "Four")
        .with_step(StepSpec::navigate("Open", "https://example.test"))
        .with_step(click("First", "#first"))
        .with_step(click("Second", "#second"))
        .with_step(click("Fourth", "#fourth"));

    let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.state, RunState::Finalized);
    let statuses: Vec<StepStatus> = summary.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Pass, StepStatus::Pass, StepStatus::Fail]
    );
    assert_eq!(driver.lookups(&Selector::css("#fourth")), 0);

    let report = ReportDocument::load(&summary.report_dir).unwrap();
    assert_eq!(report.passed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.aborted_at.as_deref(), Some("Second"));
    assert!(report.failed[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("ActionFailed"));

    let text = std::fs::read_to_string(summary.report_dir.join(SUMMARY_TEXT_FILE)).unwrap();
    assert!(text.contains("Outcome:        ABORTED"));
    assert!(text.contains("Failed:         1"));

    match summary.ensure_completed() {
        Err(FlowError::WorkflowAborted { step, cause }) => {
            assert_eq!(step, "Second");
            assert!(matches!(cause, StepFailure::ActionFailed(_)));
        }
        other => panic!("expected WorkflowAborted, got {other:?}"),
    }
    assert_eq!(driver.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_does_not_eat_into_the_next_verification_budget() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new()
        .with_url_after("https://admin.example.test/dashboard", Duration::from_millis(60_500));
    let (pause, resume) = ChannelPause::new();
    let workflow = Workflow::new("Login", "Login")
        .with_step(StepSpec::pause("Solve CAPTCHA", "Enter the CAPTCHA and log in"))
        .with_step(StepSpec::verify(
            "Reached dashboard",
            VerificationSpec::new(Condition::UrlContains("/dashboard".to_string()), 1000),
        ));

    let start = Instant::now();
    tokio::spawn(async move {
        sleep(Duration::from_secs(60)).await;
        resume.resume();
    });
    let summary = orchestrator(&driver)
        .with_pause_point(Arc::new(pause))
        .run(&workflow, root.path())
        .await
        .unwrap();

    assert!(summary.is_success(), "{:?}", summary.results);
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert!(start.elapsed() < Duration::from_millis(61_100));
    assert_eq!(summary.results[1].verified_by, Some(MatchedCondition::Primary));
}

#[tokio::test(start_paused = true)]
async fn closed_resume_channel_aborts_at_the_pause() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new();
    let (pause, resume) = ChannelPause::new();
    drop(resume);
    let workflow = Workflow::new("Login", "Login")
        .with_step(StepSpec::pause("Solve CAPTCHA", "Enter the CAPTCHA"))
        .with_step(StepSpec::navigate("Open", "https://example.test"));

    let summary = orchestrator(&driver)
        .with_pause_point(Arc::new(pause))
        .run(&workflow, root.path())
        .await
        .unwrap();

    assert_eq!(summary.results.len(), 1);
    assert_eq!(
        summary.results[0].error_message.as_deref(),
        Some("PauseInterrupted: resume channel closed")
    );
    assert!(!driver
        .calls()
        .iter()
        .any(|c| matches!(c, DriverCall::Navigate(_))));
}

#[tokio::test(start_paused = true)]
async fn steps_run_strictly_in_order_with_one_capture_per_action() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new()
        .with_element(Selector::css("#name"))
        .with_element(Selector::css("#save"));
    let workflow = Workflow::new("Fill", "Fill")
        .with_step(StepSpec::navigate("Open form", "https://example.test/form"))
        .with_step(StepSpec::interact(
            "Type name",
            Locator::new(Selector::css("#name"), 1000),
            Action::Type {
                text: "ACME".to_string(),
            },
        ))
        .with_step(click("Save", "#save").with_post_action_wait(500));

    let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();
    assert!(summary.is_success());

    let name = driver.handle_for(&Selector::css("#name"));
    let save = driver.handle_for(&Selector::css("#save"));
    let shots = driver.screenshots();
    assert_eq!(shots.len(), 4);
    assert_eq!(
        driver.significant_calls(),
        vec![
            DriverCall::Navigate("https://example.test/form".to_string()),
            DriverCall::Screenshot(shots[0].clone()),
            DriverCall::Mark(name.clone()),
            DriverCall::Perform(name, ActionKind::Type),
            DriverCall::Screenshot(shots[1].clone()),
            DriverCall::Mark(save.clone()),
            DriverCall::Perform(save, ActionKind::Click),
            DriverCall::Screenshot(shots[2].clone()),
            DriverCall::Screenshot(shots[3].clone()),
            DriverCall::Close,
        ]
    );
    assert!(shots[1].ends_with("02_Type_name.png"));
    assert!(shots[3].ends_with("04_final_success.png"));

    // Started/finished timestamps never overlap
    for pair in summary.results.windows(2) {
        assert!(pair[0].finished_at <= pair[1].started_at);
    }
}

#[tokio::test(start_paused = true)]
async fn report_and_release_happen_after_a_driver_crash() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new()
        .with_element(Selector::css("#ok"))
        .with_element(Selector::css("#crash"))
        .panicking_action(Selector::css("#crash"));
    let workflow = Workflow::new("Crash", "Crash")
        .with_step(click("Fine", "#ok"))
        .with_step(click("Crash", "#crash"));

    let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

    let report = ReportDocument::load(&summary.report_dir).unwrap();
    assert_eq!(report.passed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "Crash");
    assert_eq!(driver.close_count(), 1);
    assert!(driver
        .screenshots()
        .last()
        .map(|p| p.ends_with("02_final_error.png"))
        .unwrap_or(false));
}

#[tokio::test(start_paused = true)]
async fn locator_failures_are_not_retried() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new();
    let workflow = Workflow::new("Missing", "Missing").with_step(click("Ghost", "#ghost").with_retry(
        RetryPolicy::Retry {
            max_attempts: 3,
            backoff_ms: 10,
        },
    ));

    let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].attempt, 1);
}

#[tokio::test(start_paused = true)]
async fn verification_timeout_exhausts_retries() {
    let root = tempfile::tempdir().unwrap();
    let driver = ScriptedDriver::new().with_element(Selector::css("#save"));
    let workflow = Workflow::new("Save", "Save").with_step(
        click("Save", "#save")
            .with_verification(VerificationSpec::new(
                Condition::TitleContains("Saved".to_string()),
                500,
            ))
            .with_retry(RetryPolicy::Retry {
                max_attempts: 2,
                backoff_ms: 100,
            }),
    );

    let summary = orchestrator(&driver).run(&workflow, root.path()).await.unwrap();

    let attempts: Vec<(StepStatus, u32)> = summary
        .results
        .iter()
        .map(|r| (r.status, r.attempt))
        .collect();
    assert_eq!(attempts, vec![(StepStatus::Fail, 1), (StepStatus::Fail, 2)]);
    let message = summary.results[1].error_message.clone().unwrap_or_default();
    assert!(message.starts_with("VerificationTimedOut"), "{message}");
    assert_eq!(summary.report.failed.len(), 2);
}
