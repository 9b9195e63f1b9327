use clap::Subcommand;

use super::run::RunArgs;
use super::summary::SummaryArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run a workflow file against a fresh Chromium session
    Run(RunArgs),

    /// Check a workflow file and print its worst-case waits
    Validate(ValidateArgs),

    /// Print the summary of a finished run
    Summary(SummaryArgs),

    /// Show version and environment information
    Info,
}
