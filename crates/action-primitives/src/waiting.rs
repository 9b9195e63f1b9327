//! Bounded waiting for action primitives

use crate::driver::DriverError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Polling wait that never blocks longer than its budget
///
/// Every probe runs inside a single `tokio::time::timeout` covering the whole
/// budget, so a slow driver call cannot stretch the wait either.
#[derive(Debug, Clone, Copy)]
pub struct BoundedWait {
    /// Delay between two probes
    pub poll_interval: Duration,
}

impl Default for BoundedWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl BoundedWait {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Poll `probe` until it yields a value or `budget` elapses.
    ///
    /// Returns `Ok(None)` on timeout. Transient driver errors count as "not
    /// yet"; any other driver error ends the wait immediately. A zero budget
    /// still performs one probe.
    pub async fn until<T, F, Fut>(&self, budget: Duration, mut probe: F) -> Result<Option<T>, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, DriverError>>,
    {
        let interval = self.poll_interval;
        let polling = async {
            loop {
                match probe().await {
                    Ok(Some(value)) => return Ok(Some(value)),
                    Ok(None) => {}
                    Err(err) if err.is_transient() => {
                        debug!("transient driver error while waiting: {}", err);
                    }
                    Err(err) => return Err(err),
                }
                sleep(interval).await;
            }
        };

        match timeout(budget, polling).await {
            Ok(result) => result,
            Err(_) => {
                debug!(budget_ms = budget.as_millis() as u64, "bounded wait elapsed");
                Ok(None)
            }
        }
    }

    /// Let the UI settle after an action.
    pub async fn settle(&self, wait: Duration) {
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}
