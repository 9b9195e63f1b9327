//! Element resolver with fallback chain orchestration

use crate::{errors::LocatorError, types::*};
use action_primitives::{BoundedWait, BrowserDriver};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve the locator against the live page.
    ///
    /// The primary selector is polled for `timeout_ms_primary`; each fallback
    /// then gets `timeout_ms_fallback`. Fails with `NotFound` once every
    /// selector is exhausted.
    async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        locator: &Locator,
    ) -> Result<ResolutionResult, LocatorError>;
}

/// Default element resolver implementation
#[derive(Debug, Clone, Default)]
pub struct DefaultElementResolver {
    waiter: BoundedWait,
}

impl DefaultElementResolver {
    pub fn new(waiter: BoundedWait) -> Self {
        Self { waiter }
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        locator: &Locator,
    ) -> Result<ResolutionResult, LocatorError> {
        locator.validate().map_err(LocatorError::InvalidLocator)?;
        info!("Resolving element: {}", locator);
        let start = Instant::now();

        for (matched, selector) in locator.candidates() {
            let budget = match matched {
                MatchedSelector::Primary => locator.primary_budget(),
                MatchedSelector::Fallback(_) => locator.fallback_budget(),
            };
            debug!(
                selector = %selector,
                budget_ms = budget.as_millis() as u64,
                "Trying {} selector",
                matched
            );

            let found = self
                .waiter
                .until(budget, || driver.find_element(selector))
                .await?;

            if let Some(element) = found {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                if matched != MatchedSelector::Primary {
                    warn!(selector = %selector, "Primary selector missed, resolved via {}", matched);
                }
                info!(
                    element = %element,
                    matched = %matched,
                    elapsed_ms = elapsed_ms,
                    "Resolved element"
                );
                return Ok(ResolutionResult {
                    element,
                    matched,
                    selector: selector.clone(),
                    elapsed_ms,
                });
            }
        }

        Err(LocatorError::NotFound(format!(
            "no selector matched within {} ms: {}",
            locator.worst_case_wait().as_millis(),
            locator
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::testing::ScriptedDriver;
    use action_primitives::Selector;
    use std::time::Duration;

    fn locator() -> Locator {
        Locator::new(Selector::css("#add"), 1000)
            .with_fallback(Selector::xpath("//button[text()='Add']"))
            .with_fallback(Selector::class_name("add-btn"))
            .with_fallback_timeout(500)
    }

    #[tokio::test(start_paused = true)]
    async fn primary_hit_never_touches_fallbacks() {
        let driver = ScriptedDriver::new().with_element(Selector::css("#add"));
        let result = DefaultElementResolver::default()
            .resolve(&driver, &locator())
            .await
            .unwrap();

        assert_eq!(result.matched, MatchedSelector::Primary);
        assert_eq!(result.element, driver.handle_for(&Selector::css("#add")));
        assert_eq!(driver.lookups(&Selector::xpath("//button[text()='Add']")), 0);
        assert_eq!(driver.lookups(&Selector::class_name("add-btn")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_matching_fallback_wins() {
        let driver = ScriptedDriver::new()
            .with_element(Selector::xpath("//button[text()='Add']"))
            .with_element(Selector::class_name("add-btn"));
        let result = DefaultElementResolver::default()
            .resolve(&driver, &locator())
            .await
            .unwrap();

        assert_eq!(result.matched, MatchedSelector::Fallback(0));
        assert!(result.is_fallback());
        assert_eq!(driver.lookups(&Selector::class_name("add-btn")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_locator_reports_not_found_within_budget() {
        let driver = ScriptedDriver::new();
        let start = tokio::time::Instant::now();
        let err = DefaultElementResolver::default()
            .resolve(&driver, &locator())
            .await
            .unwrap_err();

        assert!(matches!(err, LocatorError::NotFound(_)));
        assert!(start.elapsed() <= locator().worst_case_wait() + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn late_primary_is_still_found_inside_budget() {
        let driver = ScriptedDriver::new()
            .with_element_after(Selector::css("#add"), Duration::from_millis(700));
        let result = DefaultElementResolver::default()
            .resolve(&driver, &locator())
            .await
            .unwrap();
        assert_eq!(result.matched, MatchedSelector::Primary);
        assert!(result.elapsed_ms < 1000);
    }

    #[tokio::test]
    async fn invalid_locator_is_rejected_without_lookups() {
        let driver = ScriptedDriver::new();
        let err = DefaultElementResolver::default()
            .resolve(&driver, &Locator::new(Selector::css(""), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::InvalidLocator(_)));
        assert!(driver.calls().is_empty());
    }
}
