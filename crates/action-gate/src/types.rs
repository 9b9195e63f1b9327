//! Core types for the verification gate

use crate::conditions::Condition;
use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Success check for one step
///
/// The primary condition gets `timeout_ms_primary`; only once it has missed
/// are the fallbacks tried, in order, each with `timeout_ms_fallback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSpec {
    /// Condition tried first
    pub primary: Condition,

    /// Ordered alternates
    #[serde(default)]
    pub fallbacks: Vec<Condition>,

    /// Budget for the primary condition
    pub timeout_ms_primary: u64,

    /// Budget for each fallback condition
    pub timeout_ms_fallback: u64,
}

impl VerificationSpec {
    pub fn new(primary: Condition, timeout_ms_primary: u64) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            timeout_ms_primary,
            timeout_ms_fallback: 0,
        }
    }

    pub fn with_fallback(mut self, condition: Condition) -> Self {
        self.fallbacks.push(condition);
        self
    }

    pub fn with_fallback_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms_fallback = timeout_ms;
        self
    }

    pub fn primary_budget(&self) -> Duration {
        Duration::from_millis(self.timeout_ms_primary)
    }

    pub fn fallback_budget(&self) -> Duration {
        Duration::from_millis(self.timeout_ms_fallback)
    }

    /// Longest a verification can block: primary + fallback × count
    pub fn worst_case_wait(&self) -> Duration {
        let fallbacks = self
            .timeout_ms_fallback
            .saturating_mul(self.fallbacks.len() as u64);
        Duration::from_millis(self.timeout_ms_primary.saturating_add(fallbacks))
    }

    /// Primary followed by fallbacks, tagged with their position
    pub fn candidates(&self) -> impl Iterator<Item = (MatchedCondition, &Condition)> {
        std::iter::once((MatchedCondition::Primary, &self.primary)).chain(
            self.fallbacks
                .iter()
                .enumerate()
                .map(|(index, condition)| (MatchedCondition::Fallback(index), condition)),
        )
    }

    /// Check every condition compiles
    pub fn validate(&self) -> Result<(), GateError> {
        for (_, condition) in self.candidates() {
            condition.prepare()?;
        }
        Ok(())
    }
}

/// Which condition satisfied a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedCondition {
    Primary,
    Fallback(usize),
}

impl fmt::Display for MatchedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedCondition::Primary => f.write_str("primary"),
            MatchedCondition::Fallback(index) => write!(f, "fallback_{}", index),
        }
    }
}

/// Result of a verification
///
/// `TimedOut` is an ordinary outcome, not an error; the caller decides
/// whether it is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Matched {
        which: MatchedCondition,
        evidence_path: PathBuf,
        elapsed_ms: u64,
    },
    TimedOut {
        waited_ms: u64,
    },
}

impl VerificationOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, VerificationOutcome::Matched { .. })
    }

    pub fn matched(&self) -> Option<MatchedCondition> {
        match self {
            VerificationOutcome::Matched { which, .. } => Some(*which),
            VerificationOutcome::TimedOut { .. } => None,
        }
    }

    pub fn evidence_path(&self) -> Option<&PathBuf> {
        match self {
            VerificationOutcome::Matched { evidence_path, .. } => Some(evidence_path),
            VerificationOutcome::TimedOut { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::Selector;

    fn spec() -> VerificationSpec {
        VerificationSpec::new(
            Condition::ElementPresent(Selector::xpath("/html/body/div[5]")),
            1000,
        )
        .with_fallback(Condition::ElementPresent(Selector::class_name(
            "el-message__content",
        )))
        .with_fallback_timeout(2000)
    }

    #[test]
    fn worst_case_wait_adds_each_fallback() {
        assert_eq!(spec().worst_case_wait(), Duration::from_millis(3000));
        let two = spec().with_fallback(Condition::UrlContains("done".to_string()));
        assert_eq!(two.worst_case_wait(), Duration::from_millis(5000));
    }

    #[test]
    fn validate_reports_bad_fallback() {
        let bad = spec().with_fallback(Condition::UrlMatches("(".to_string()));
        assert!(bad.validate().is_err());
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = VerificationOutcome::TimedOut { waited_ms: 3000 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "timed_out");
        assert!(!outcome.is_matched());
        assert_eq!(outcome.matched(), None);
    }
}
