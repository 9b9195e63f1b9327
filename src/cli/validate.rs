use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use humantime::format_duration;
use serde::Serialize;

use super::context::CliContext;
use super::output::{emit, OutputFormat};
use crate::workflow_file::load_workflow;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Workflow file (YAML)
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub workflow: String,
    pub label: String,
    pub steps: Vec<StepPlan>,
    /// Sum of every bounded step; pause points are not counted
    pub worst_case_ms: u64,
    pub pause_points: usize,
}

#[derive(Debug, Serialize)]
pub struct StepPlan {
    pub index: usize,
    pub name: String,
    pub kind: &'static str,
    pub evidence_label: String,
    /// `None` for pause points, which wait without a bound
    pub worst_case_ms: Option<u64>,
}

pub async fn cmd_validate(args: ValidateArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let workflow = load_workflow(&args.file, &ctx.config().defaults).await?;

    let steps: Vec<StepPlan> = workflow
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| StepPlan {
            index: index + 1,
            name: step.name.clone(),
            kind: step.kind.name(),
            evidence_label: step.evidence_label.clone(),
            worst_case_ms: step.worst_case_wait().map(|wait| wait.as_millis() as u64),
        })
        .collect();
    let report = ValidationReport {
        workflow: workflow.name.clone(),
        label: workflow.label.clone(),
        pause_points: workflow.steps.iter().filter(|step| step.is_pause()).count(),
        worst_case_ms: workflow.worst_case_wait().as_millis() as u64,
        steps,
    };

    emit(output, &report, render_human)
}

fn render_human(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Workflow '{}' is valid", report.workflow);
    let _ = writeln!(out, "Report label: {}", report.label);
    let _ = writeln!(out);
    for step in &report.steps {
        let wait = match step.worst_case_ms {
            Some(ms) => format_duration(Duration::from_millis(ms)).to_string(),
            None => "unbounded".to_string(),
        };
        let _ = writeln!(
            out,
            "  {:>2}. [{:<8}] {} (worst case {})",
            step.index, step.kind, step.name, wait
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Worst-case wait: {}",
        format_duration(Duration::from_millis(report.worst_case_ms))
    );
    if report.pause_points > 0 {
        let _ = writeln!(
            out,
            "Pause points:    {} (not included above)",
            report.pause_points
        );
    }
    out
}
