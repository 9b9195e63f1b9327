//! Error types for action primitives

use crate::driver::DriverError;
use crate::types::ActionKind;
use thiserror::Error;

/// Error types for interaction and evidence operations
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// The resolved element rejected the interaction (stale, obscured, disabled)
    #[error("Failed to {action} element: {cause}")]
    ActionFailed { action: ActionKind, cause: DriverError },

    /// Action payload is invalid (e.g. `PressKey` without a key)
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Screenshot could not be written
    #[error("Evidence capture failed: {0}")]
    EvidenceFailed(String),

    /// Report directory could not be allocated
    #[error("Report directory error: {0}")]
    ReportDir(String),

    /// Driver communication error outside of an action
    #[error("Driver I/O error: {0}")]
    DriverIo(String),
}

impl From<DriverError> for ActionError {
    fn from(err: DriverError) -> Self {
        ActionError::DriverIo(err.to_string())
    }
}
