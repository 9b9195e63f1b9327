//! Retry policy wrapping a single step

use crate::errors::StepFailure;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Explicit retry policy for one step
///
/// The engine never retries on its own. A step opts in with `Retry`; every
/// attempt still appends its own result to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Single attempt
    #[default]
    None,

    /// Retry with exponential backoff
    Retry { max_attempts: u32, backoff_ms: u64 },
}

impl RetryPolicy {
    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Retry { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Check if another attempt should follow attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32, failure: &StepFailure) -> bool {
        failure.is_retryable() && attempt < self.max_attempts()
    }

    /// Backoff before attempt `attempt + 1`: backoff_ms * 2^(attempt-1), capped at 60s
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::Retry { backoff_ms, .. } => {
                let multiplier = 2u64.saturating_pow(attempt.saturating_sub(1));
                let total_ms = backoff_ms.saturating_mul(multiplier);
                Duration::from_millis(total_ms.min(60_000))
            }
            RetryPolicy::None => Duration::ZERO,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            RetryPolicy::Retry { max_attempts: 0, .. } => {
                Err("retry max_attempts must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }
}
