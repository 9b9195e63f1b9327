use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Debug, Serialize)]
struct InfoReport {
    version: &'static str,
    build_date: &'static str,
    git_hash: &'static str,
    git_branch: &'static str,
    config_path: PathBuf,
    config_found: bool,
    reports_root: PathBuf,
    headless: bool,
    chrome: Option<PathBuf>,
}

pub async fn cmd_info(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let report = InfoReport {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        config_path: ctx.config_path().to_path_buf(),
        config_found: ctx.config_path().exists(),
        reports_root: config.reports_root.clone(),
        headless: config.browser.headless,
        chrome: config.cdp_config().with_env_overrides().resolve_executable(),
    };
    emit(output, &report, render_human)
}

fn render_human(report: &InfoReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "uiflow {}", report.version);
    let _ = writeln!(
        out,
        "Built:        {} ({}@{})",
        report.build_date, report.git_branch, report.git_hash
    );
    let _ = writeln!(
        out,
        "Config:       {}{}",
        report.config_path.display(),
        if report.config_found { "" } else { " (not found, using defaults)" }
    );
    let _ = writeln!(out, "Reports root: {}", report.reports_root.display());
    let _ = writeln!(out, "Headless:     {}", report.headless);
    match &report.chrome {
        Some(path) => {
            let _ = writeln!(out, "Chrome:       {}", path.display());
        }
        None => {
            let _ = writeln!(out, "Chrome:       not found (set UIFLOW_CHROME_PATH)");
        }
    }
    out
}
