use std::path::PathBuf;
use std::sync::Arc;

use action_flow::{ImmediateResume, PausePoint, ReportDocument, StdinPause, WorkflowOrchestrator};
use anyhow::{Context, Result};
use cdp_adapter::ChromiumDriver;
use clap::Args;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::{emit, OutputFormat};
use crate::workflow_file::load_workflow;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Workflow file (YAML)
    pub file: PathBuf,

    /// Root directory for run reports (overrides config)
    #[arg(long, value_name = "DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Run Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Resume pause points immediately instead of waiting for Enter
    #[arg(long)]
    pub auto_resume: bool,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let workflow = load_workflow(&args.file, &config.defaults).await?;
    let reports_root = args
        .reports_dir
        .clone()
        .unwrap_or_else(|| config.reports_root.clone());

    let mut cdp = config.cdp_config().with_env_overrides();
    if args.headless {
        cdp.headless = true;
    }
    let driver = ChromiumDriver::launch(&cdp)
        .await
        .context("Failed to start the browser session")?;

    let pause: Arc<dyn PausePoint> = if args.auto_resume {
        warn!("Pause points resume immediately (--auto-resume)");
        Arc::new(ImmediateResume)
    } else {
        Arc::new(StdinPause::new())
    };

    info!(
        workflow = %workflow.name,
        steps = workflow.steps.len(),
        reports_root = %reports_root.display(),
        "Running workflow"
    );
    let summary = WorkflowOrchestrator::new(Box::new(driver))
        .with_engine_settings(config.waiter(), config.marker())
        .with_pause_point(pause)
        .run(&workflow, &reports_root)
        .await?;

    emit(output, &summary.report, render_human)?;
    summary.ensure_completed()?;
    Ok(())
}

fn render_human(report: &ReportDocument) -> String {
    format!(
        "{}\nReport directory: {}\n",
        report.render_text(),
        report.report_dir.display()
    )
}
