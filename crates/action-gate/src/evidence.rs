//! Evidence labels for verification captures

use crate::types::MatchedCondition;

/// Label for the capture taken when `which` matched.
///
/// `<prefix>_primary` for the primary condition,
/// `<prefix>_fallback_<index>` for a fallback.
pub fn verification_label(prefix: &str, which: MatchedCondition) -> String {
    format!("{}_{}", prefix, which)
}
