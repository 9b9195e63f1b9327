//! Core types for locator system

use action_primitives::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uiflow_core_types::ElementHandle;

/// How to find one UI element
///
/// `fallbacks` are tried only after `primary` is exhausted, in declaration
/// order; the first fallback that matches wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Selector tried first
    pub primary: Selector,

    /// Ordered alternates
    #[serde(default)]
    pub fallbacks: Vec<Selector>,

    /// Budget for the primary selector
    pub timeout_ms_primary: u64,

    /// Budget for each fallback selector
    pub timeout_ms_fallback: u64,
}

impl Locator {
    /// Locator with no fallbacks and the given primary budget
    pub fn new(primary: Selector, timeout_ms_primary: u64) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            timeout_ms_primary,
            timeout_ms_fallback: 0,
        }
    }

    /// Append a fallback selector
    pub fn with_fallback(mut self, selector: Selector) -> Self {
        self.fallbacks.push(selector);
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

    /// Longest a resolution can block: primary + fallback × count
    pub fn worst_case_wait(&self) -> Duration {
        let fallbacks = self
            .timeout_ms_fallback
            .saturating_mul(self.fallbacks.len() as u64);
        Duration::from_millis(self.timeout_ms_primary.saturating_add(fallbacks))
    }

    /// Primary followed by fallbacks, tagged with their position
    pub fn candidates(&self) -> impl Iterator<Item = (MatchedSelector, &Selector)> {
        std::iter::once((MatchedSelector::Primary, &self.primary)).chain(
            self.fallbacks
                .iter()
                .enumerate()
                .map(|(index, selector)| (MatchedSelector::Fallback(index), selector)),
        )
    }

    /// Reject empty selectors before a run starts
    pub fn validate(&self) -> Result<(), String> {
        if self.primary.is_empty() {
            return Err("primary selector is empty".to_string());
        }
        if let Some(index) = self.fallbacks.iter().position(Selector::is_empty) {
            return Err(format!("fallback selector {} is empty", index));
        }
        Ok(())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        for fallback in &self.fallbacks {
            write!(f, " | {}", fallback)?;
        }
        Ok(())
    }
}

/// Which selector of a locator produced the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedSelector {
    Primary,
    Fallback(usize),
}

impl fmt::Display for MatchedSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedSelector::Primary => f.write_str("primary"),
            MatchedSelector::Fallback(index) => write!(f, "fallback_{}", index),
        }
    }
}

/// Element resolution result
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    /// Resolved element handle, valid for the current step only
    pub element: ElementHandle,

    /// Position of the selector that matched
    pub matched: MatchedSelector,

    /// The selector that matched
    pub selector: Selector,

    /// Time spent resolving
    pub elapsed_ms: u64,
}

impl ResolutionResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self.matched, MatchedSelector::Fallback(_))
    }
}
