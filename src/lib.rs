//! uiflow CLI library
//!
//! Exposes the binary's modules for integration testing

pub mod cli;
pub mod config;
pub mod errors;
pub mod placeholders;
pub mod workflow_file;

pub use config::Config;
pub use errors::UiflowError;
pub use workflow_file::{load_workflow, parse_workflow};
