//! Error types for locator system

use action_primitives::DriverError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No selector matched within its budget
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Locator is structurally invalid (empty selector)
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Driver reported a non-transient failure during lookup
    #[error("Driver error during lookup: {0}")]
    Driver(#[from] DriverError),
}

