//! Verification gate - confirms a step's effect on the page
//!
//! This crate implements the fallback-aware verification resolver:
//! - Conditions over page state (element present, URL, title)
//! - Primary condition polled under its own budget
//! - Ordered fallbacks, each with an independent budget
//! - Exactly one evidence capture per match, none on timeout

pub mod conditions;
pub mod errors;
pub mod evidence;
pub mod types;
pub mod validator;

pub use conditions::*;
pub use errors::*;
pub use evidence::*;
pub use types::*;
pub use validator::*;
