//! Locator - primary selector with ordered fallbacks
//!
//! This crate resolves one element for a workflow step:
//! - The primary selector is polled for its own bounded budget
//! - Fallback selectors are tried only after the primary is exhausted
//! - Fallback order is significant; the first one that matches wins

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use types::*;
