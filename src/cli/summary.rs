use std::path::PathBuf;

use action_flow::ReportDocument;
use anyhow::Result;
use clap::Args;

use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SummaryArgs {
    /// Report directory of a finished run
    pub run_dir: PathBuf,
}

pub async fn cmd_summary(args: SummaryArgs, output: OutputFormat) -> Result<()> {
    let report = ReportDocument::load(&args.run_dir)?;
    emit(output, &report, ReportDocument::render_text)
}
