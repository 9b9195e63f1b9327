//! Step tracker - ordered, append-only step results

use crate::types::{StepResult, StepStatus};
use tracing::debug;

/// Records step results in invocation order
///
/// A step name may appear more than once (retries); every invocation
/// appends a new result and nothing is ever overwritten.
#[derive(Debug, Default, Clone)]
pub struct StepTracker {
    results: Vec<StepResult>,
}

impl StepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the result of one step invocation
    pub fn record(&mut self, result: StepResult) {
        debug!(
            step = %result.step_name,
            status = %result.status,
            attempt = result.attempt,
            "Recorded step result"
        );
        self.results.push(result);
    }

    /// All results so far, in invocation order
    pub fn snapshot(&self) -> &[StepResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.count(StepStatus::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(StepStatus::Fail)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}
