use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Human,
    Json,
}

/// Print `value` in the requested format; `human` renders the human form.
pub fn emit<T, F>(format: OutputFormat, value: &T, human: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => print!("{}", human(value)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to encode JSON output")?
        ),
        OutputFormat::Yaml => print!(
            "{}",
            serde_yaml::to_string(value).context("Failed to encode YAML output")?
        ),
    }
    Ok(())
}
