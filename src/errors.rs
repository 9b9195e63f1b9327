//! Error types for the CLI layer
//!
//! Engine failures stay in their own crates' error types; this enum only
//! covers what the binary itself loads and prepares.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UiflowError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Invalid workflow file {path}: {reason}")]
    WorkflowFile { path: PathBuf, reason: String },

    #[error("Cannot expand '{placeholder}': {reason}")]
    Placeholder { placeholder: String, reason: String },
}

impl UiflowError {
    pub fn workflow(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        UiflowError::WorkflowFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn placeholder(placeholder: impl Into<String>, reason: impl Into<String>) -> Self {
        UiflowError::Placeholder {
            placeholder: placeholder.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UiflowError>;
