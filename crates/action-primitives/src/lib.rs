//! Action primitives - the lowest layer of the workflow engine
//!
//! This crate provides the building blocks every workflow step is made of:
//! - Selector and action data (`Selector`, `Action`)
//! - The `BrowserDriver` port the engine consumes as an opaque capability
//! - Bounded waits that never exceed their budget
//! - The per-run evidence store (ordered, non-overwriting screenshots)
//! - The interaction executor: mark → act → settle → capture

pub mod driver;
pub mod errors;
pub mod evidence;
mod primitives;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
mod waiting;

pub use driver::*;
pub use errors::*;
pub use evidence::*;
pub use primitives::*;
pub use types::*;
pub use uiflow_core_types::{ElementHandle, SessionId};
pub use waiting::*;
