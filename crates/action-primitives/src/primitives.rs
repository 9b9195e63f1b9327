//! Interaction executor
//!
//! Performs one UI action against an already-resolved element:
//! 1. apply the visual marker (evidentiary only)
//! 2. dispatch the action
//! 3. wait for the UI to settle
//! 4. capture exactly one screenshot
//!
//! The order is fixed so evidence always reflects the post-action state.

use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uiflow_core_types::ElementHandle;

use crate::{
    driver::BrowserDriver,
    errors::ActionError,
    evidence::EvidenceStore,
    types::{Action, InteractionReport},
    waiting::BoundedWait,
};

/// Interaction executor trait
///
/// Implementations are stateless between calls and never retry; retry policy
/// belongs to the caller.
#[async_trait]
pub trait InteractionExecutor: Send + Sync {
    async fn execute(
        &self,
        driver: &dyn BrowserDriver,
        element: &ElementHandle,
        action: &Action,
        evidence_label: &str,
        evidence: &EvidenceStore,
        post_wait: Duration,
    ) -> Result<InteractionReport, ActionError>;
}

/// Visual marker applied before an action
#[derive(Debug, Clone)]
pub struct MarkerStyle {
    /// CSS border value
    pub border_css: String,

    /// How long the marker stays visible before the action
    pub hold: Duration,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            border_css: "3px solid red".to_string(),
            hold: Duration::from_millis(1000),
        }
    }
}

/// Default implementation of the interaction executor
#[derive(Debug, Clone, Default)]
pub struct DefaultInteractionExecutor {
    marker: MarkerStyle,
    waiter: BoundedWait,
}

impl DefaultInteractionExecutor {
    pub fn new(marker: MarkerStyle, waiter: BoundedWait) -> Self {
        Self { marker, waiter }
    }
}

#[async_trait]
impl InteractionExecutor for DefaultInteractionExecutor {
    async fn execute(
        &self,
        driver: &dyn BrowserDriver,
        element: &ElementHandle,
        action: &Action,
        evidence_label: &str,
        evidence: &EvidenceStore,
        post_wait: Duration,
    ) -> Result<InteractionReport, ActionError> {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let kind = action.kind();

        info!(
            element = %element,
            action = %kind,
            evidence = evidence_label,
            "Executing interaction"
        );

        action.validate().map_err(ActionError::InvalidAction)?;

        // 1. Marker
        let marked = match driver.mark(element, &self.marker.border_css).await {
            Ok(()) => {
                if !self.marker.hold.is_zero() {
                    sleep(self.marker.hold).await;
                }
                true
            }
            Err(err) => {
                warn!(element = %element, "failed to apply visual marker: {}", err);
                false
            }
        };

        // 2. Action
        debug!("Dispatching {} to {}", kind, element);
        driver
            .perform(element, action)
            .await
            .map_err(|cause| ActionError::ActionFailed { action: kind, cause })?;

        // 3. Settle
        self.waiter.settle(post_wait).await;

        // 4. Evidence
        let evidence_path = evidence.capture(driver, evidence_label).await?;

        let latency_ms = start_instant.elapsed().as_millis() as u64;
        info!(
            action = %kind,
            latency_ms = latency_ms,
            evidence = %evidence_path.display(),
            "Interaction completed"
        );

        Ok(InteractionReport {
            action: kind,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            marked,
            evidence_path,
        })
    }
}
