//! Verification resolver - primary condition, then ordered fallbacks

use crate::{
    conditions::ConditionProbe, errors::GateError, evidence::verification_label, types::*,
};
use action_primitives::{BoundedWait, BrowserDriver, EvidenceStore};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Verification resolver trait
///
/// Implementations are stateless between calls.
#[async_trait]
pub trait VerificationResolver: Send + Sync {
    /// Verify a step's effect.
    ///
    /// Returns `Matched` with the capture taken for the winning condition, or
    /// `TimedOut` once every condition has exhausted its budget. Errors are
    /// reserved for defects: invalid specs, driver crashes, failed captures.
    async fn verify(
        &self,
        driver: &dyn BrowserDriver,
        spec: &VerificationSpec,
        evidence: &EvidenceStore,
        label_prefix: &str,
    ) -> Result<VerificationOutcome, GateError>;
}

/// Default verification resolver implementation
#[derive(Debug, Clone, Default)]
pub struct DefaultVerificationResolver {
    waiter: BoundedWait,
}

impl DefaultVerificationResolver {
    pub fn new(waiter: BoundedWait) -> Self {
        Self { waiter }
    }
}

#[async_trait]
impl VerificationResolver for DefaultVerificationResolver {
    async fn verify(
        &self,
        driver: &dyn BrowserDriver,
        spec: &VerificationSpec,
        evidence: &EvidenceStore,
        label_prefix: &str,
    ) -> Result<VerificationOutcome, GateError> {
        // Compile every condition before the first wait
        let probes: Vec<(MatchedCondition, ConditionProbe)> = spec
            .candidates()
            .map(|(which, condition)| condition.prepare().map(|probe| (which, probe)))
            .collect::<Result<_, _>>()?;

        info!(
            primary = %spec.primary,
            fallbacks = spec.fallbacks.len(),
            worst_case_ms = spec.worst_case_wait().as_millis() as u64,
            "Starting verification"
        );
        let start = Instant::now();

        for (which, probe) in &probes {
            let budget = match which {
                MatchedCondition::Primary => spec.primary_budget(),
                MatchedCondition::Fallback(_) => spec.fallback_budget(),
            };
            debug!(
                condition = %probe.condition(),
                budget_ms = budget.as_millis() as u64,
                "Waiting for {} condition",
                which
            );

            let hit = self
                .waiter
                .until(budget, || async move {
                    probe.check(driver).await.map(|met| met.then_some(()))
                })
                .await?;

            if hit.is_some() {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                let evidence_path = evidence
                    .capture(driver, &verification_label(label_prefix, *which))
                    .await?;
                if *which != MatchedCondition::Primary {
                    warn!(condition = %probe.condition(), "Primary condition missed, verified via {}", which);
                }
                info!(
                    matched = %which,
                    elapsed_ms = elapsed_ms,
                    evidence = %evidence_path.display(),
                    "Verification matched"
                );
                return Ok(VerificationOutcome::Matched {
                    which: *which,
                    evidence_path,
                    elapsed_ms,
                });
            }
            debug!("{} condition not met within {} ms", which, budget.as_millis());
        }

        let waited_ms = start.elapsed().as_millis() as u64;
        warn!(waited_ms = waited_ms, "Verification timed out");
        Ok(VerificationOutcome::TimedOut { waited_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;
    use action_primitives::testing::ScriptedDriver;
    use action_primitives::{DriverErrorKind, Selector};
    use std::time::Duration;

    fn success_spec() -> VerificationSpec {
        VerificationSpec::new(
            Condition::ElementPresent(Selector::xpath("/html/body/div[5]")),
            1000,
        )
        .with_fallback(Condition::ElementPresent(Selector::class_name(
            "el-message__content",
        )))
        .with_fallback_timeout(2000)
    }

    #[tokio::test(start_paused = true)]
    async fn primary_match_produces_only_primary_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path().to_path_buf());
        let driver = ScriptedDriver::new()
            .with_element(Selector::xpath("/html/body/div[5]"))
            .with_element(Selector::class_name("el-message__content"));

        let outcome = DefaultVerificationResolver::default()
            .verify(&driver, &success_spec(), &store, "add_supplier_success")
            .await
            .unwrap();

        assert_eq!(outcome.matched(), Some(MatchedCondition::Primary));
        let shots = driver.screenshots();
        assert_eq!(shots.len(), 1);
        assert!(shots[0].ends_with("01_add_supplier_success_primary.png"));
        assert_eq!(driver.lookups(&Selector::class_name("el-message__content")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_runs_only_after_primary_budget() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path().to_path_buf());
        let driver = ScriptedDriver::new().with_element_after(
            Selector::class_name("el-message__content"),
            Duration::from_millis(1200),
        );

        let outcome = DefaultVerificationResolver::default()
            .verify(&driver, &success_spec(), &store, "step2")
            .await
            .unwrap();

        match outcome {
            VerificationOutcome::Matched {
                which,
                evidence_path,
                elapsed_ms,
            } => {
                assert_eq!(which, MatchedCondition::Fallback(0));
                assert!(evidence_path.ends_with("01_step2_fallback_0.png"));
                assert!(elapsed_ms >= 1200 && elapsed_ms < 1400);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The fallback was never probed while the primary budget was running
        let first_fallback_probe = driver
            .calls()
            .iter()
            .position(|c| {
                *c == action_primitives::testing::DriverCall::FindElement(Selector::class_name(
                    "el-message__content",
                ))
            })
            .unwrap();
        assert!(driver.call_time(first_fallback_probe).unwrap() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_worst_case_and_captures_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path().to_path_buf());
        let driver = ScriptedDriver::new();
        let spec = success_spec().with_fallback(Condition::UrlContains("/list".to_string()));

        let start = Instant::now();
        let outcome = DefaultVerificationResolver::default()
            .verify(&driver, &spec, &store, "step")
            .await
            .unwrap();

        assert!(matches!(outcome, VerificationOutcome::TimedOut { .. }));
        assert!(start.elapsed() <= spec.worst_case_wait() + Duration::from_millis(20));
        assert!(driver.screenshots().is_empty());
        assert_eq!(store.captured(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn page_busy_lookup_keeps_the_primary_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path().to_path_buf());
        let primary = Selector::xpath("/html/body/div[5]");
        let driver = ScriptedDriver::new()
            .with_element_after(primary.clone(), Duration::from_millis(300))
            .failing_lookups(primary.clone(), DriverErrorKind::Transient, 1);

        let start = Instant::now();
        let outcome = DefaultVerificationResolver::default()
            .verify(&driver, &success_spec(), &store, "login_submit")
            .await
            .unwrap();

        assert_eq!(outcome.matched(), Some(MatchedCondition::Primary));
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert!(driver.lookups(&primary) >= 2);
        assert_eq!(driver.screenshots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_failure_during_lookup_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path().to_path_buf());
        let primary = Selector::xpath("/html/body/div[5]");
        let driver = ScriptedDriver::new()
            .with_element(primary.clone())
            .failing_lookups(primary, DriverErrorKind::Protocol, 1);

        let err = DefaultVerificationResolver::default()
            .verify(&driver, &success_spec(), &store, "login_submit")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Driver(_)));
    }

    #[tokio::test]
    async fn invalid_fallback_fails_before_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvidenceStore::open(dir.path().to_path_buf());
        let driver = ScriptedDriver::new();
        let spec = success_spec().with_fallback(Condition::UrlMatches("(".to_string()));

        let err = DefaultVerificationResolver::default()
            .verify(&driver, &spec, &store, "step")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidSpec(_)));
        assert!(driver.calls().is_empty());
    }
}
