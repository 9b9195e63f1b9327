//! Report generator - run summary written at finalization

use crate::errors::FlowError;
use crate::types::{RunOutcome, StepResult, StepStatus, WorkflowRun};
use action_gate::MatchedCondition;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Human-readable summary file inside the run directory
pub const SUMMARY_TEXT_FILE: &str = "test_summary.txt";

/// Machine-readable twin of the text summary
pub const SUMMARY_JSON_FILE: &str = "test_summary.json";

/// One line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub status: StepStatus,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<MatchedCondition>,
}

impl From<&StepResult> for ReportEntry {
    fn from(result: &StepResult) -> Self {
        Self {
            name: result.step_name.clone(),
            status: result.status,
            timestamp: result.started_at,
            duration_ms: result.duration_ms(),
            attempt: result.attempt,
            error: result.error_message.clone(),
            evidence: result.evidence_path.clone(),
            verified_by: result.verified_by,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub run_id: String,
    pub workflow: String,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub total_steps: usize,
    pub passed: Vec<ReportEntry>,
    pub failed: Vec<ReportEntry>,
    pub steps: Vec<ReportEntry>,
    pub report_dir: PathBuf,
}

impl ReportDocument {
    /// Build the document from whatever results the run holds right now.
    ///
    /// Duration spans first step start to last step finish; a run with no
    /// results falls back to the run's own timestamps.
    pub fn from_run(run: &WorkflowRun) -> Self {
        let results = run.results();
        let start_time = results
            .first()
            .map(|r| r.started_at)
            .unwrap_or(run.started_at);
        let end_time = results
            .last()
            .map(|r| r.finished_at)
            .or(run.finished_at)
            .unwrap_or(start_time);
        let steps: Vec<ReportEntry> = results.iter().map(ReportEntry::from).collect();

        let (outcome, aborted_at) = match run.outcome() {
            Some(outcome) => {
                let aborted_at = match outcome {
                    RunOutcome::Aborted { step, .. } => Some(step.clone()),
                    RunOutcome::Completed => None,
                };
                (outcome.label().to_string(), aborted_at)
            }
            None => (run.state().to_string(), None),
        };

        Self {
            run_id: run.run_id.to_string(),
            workflow: run.workflow.clone(),
            outcome,
            aborted_at,
            start_time,
            end_time,
            total_duration_ms: (end_time - start_time).num_milliseconds().max(0) as u64,
            total_steps: steps.len(),
            passed: steps
                .iter()
                .filter(|s| s.status == StepStatus::Pass)
                .cloned()
                .collect(),
            failed: steps
                .iter()
                .filter(|s| s.status == StepStatus::Fail)
                .cloned()
                .collect(),
            steps,
            report_dir: run.report_dir.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == "completed"
    }

    /// Render the plain-text summary
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let title = format!("Test Summary - {}", self.workflow);
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));
        let _ = writeln!(out, "Run ID:         {}", self.run_id);
        let _ = writeln!(out, "Outcome:        {}", self.outcome.to_uppercase());
        if let Some(step) = &self.aborted_at {
            let _ = writeln!(out, "Aborted At:     {}", step);
        }
        let _ = writeln!(out, "Start Time:     {}", local_time(&self.start_time));
        let _ = writeln!(out, "End Time:       {}", local_time(&self.end_time));
        let _ = writeln!(
            out,
            "Total Duration: {:.2}s",
            self.total_duration_ms as f64 / 1000.0
        );
        let _ = writeln!(out, "Total Steps:    {}", self.total_steps);
        let _ = writeln!(out, "Passed:         {}", self.passed.len());
        let _ = writeln!(out, "Failed:         {}", self.failed.len());

        let _ = writeln!(out);
        let _ = writeln!(out, "Passed Steps:");
        if self.passed.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (index, entry) in self.passed.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} ({})",
                index + 1,
                entry.name,
                local_time(&entry.timestamp)
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Failed Steps:");
        if self.failed.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (index, entry) in self.failed.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} ({})",
                index + 1,
                entry.name,
                local_time(&entry.timestamp)
            );
            if let Some(error) = &entry.error {
                let _ = writeln!(out, "     Error: {}", error);
            }
        }
        out
    }

    /// Read `test_summary.json` from a finished run directory
    pub fn load(run_dir: &Path) -> Result<Self, FlowError> {
        let path = run_dir.join(SUMMARY_JSON_FILE);
        let raw = std::fs::read_to_string(&path)
            .map_err(|err| FlowError::Report(format!("cannot read {}: {}", path.display(), err)))?;
        serde_json::from_str(&raw)
            .map_err(|err| FlowError::Report(format!("cannot parse {}: {}", path.display(), err)))
    }
}

fn local_time(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Report generator trait
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Summarize the run and write it into the run's report directory.
    ///
    /// Must work on partial runs: it only reads the results recorded so far.
    async fn generate(&self, run: &WorkflowRun) -> Result<ReportDocument, FlowError>;
}

/// Writes `test_summary.txt` and `test_summary.json`
#[derive(Debug, Clone, Default)]
pub struct SummaryReportGenerator;

impl SummaryReportGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportGenerator for SummaryReportGenerator {
    async fn generate(&self, run: &WorkflowRun) -> Result<ReportDocument, FlowError> {
        let document = ReportDocument::from_run(run);

        let text_path = run.report_dir.join(SUMMARY_TEXT_FILE);
        tokio::fs::write(&text_path, document.render_text())
            .await
            .map_err(|err| {
                FlowError::Report(format!("cannot write {}: {}", text_path.display(), err))
            })?;

        let json = serde_json::to_string_pretty(&document)
            .map_err(|err| FlowError::Report(format!("cannot encode summary: {}", err)))?;
        let json_path = run.report_dir.join(SUMMARY_JSON_FILE);
        tokio::fs::write(&json_path, json).await.map_err(|err| {
            FlowError::Report(format!("cannot write {}: {}", json_path.display(), err))
        })?;

        info!(
            run_id = %run.run_id,
            passed = document.passed.len(),
            failed = document.failed.len(),
            path = %text_path.display(),
            "Report written"
        );
        Ok(document)
    }
}
