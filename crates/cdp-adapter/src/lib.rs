//! Chromium DevTools Protocol driver
//!
//! Implements the engine's `BrowserDriver` on top of chromiumoxide. Elements
//! are resolved in the page and stamped with a handle attribute, so handles
//! stay plain strings and go stale with the DOM node they name.

pub mod config;
pub mod driver;
pub mod error;
pub mod scripts;

pub use config::CdpConfig;
pub use driver::ChromiumDriver;
pub use error::{AdapterError, AdapterErrorKind};
