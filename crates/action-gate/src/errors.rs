//! Error types for gate validation

use action_primitives::{ActionError, DriverError};
use thiserror::Error;

/// Gate validation error enumeration
///
/// A condition that simply never matched is not an error; it is reported as
/// `VerificationOutcome::TimedOut`.
#[derive(Debug, Error, Clone)]
pub enum GateError {
    /// Invalid verification spec (bad regex, empty selector)
    #[error("Invalid verification spec: {0}")]
    InvalidSpec(String),

    /// Driver failed with a non-transient error while probing
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Evidence collection failed after a match
    #[error("Evidence collection failed: {0}")]
    EvidenceFailed(#[from] ActionError),
}

