//! Browser driver port
//!
//! The engine consumes the browser as an opaque capability. A session object
//! implementing [`BrowserDriver`] is handed to the orchestrator at construction
//! and threaded explicitly into every executor and resolver call.

use crate::types::{Action, Selector};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uiflow_core_types::{ElementHandle, SessionId};

/// Classification of driver failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Element handle no longer attached to the document
    Stale,

    /// Element present but not interactable (obscured, disabled, hidden)
    NotInteractable,

    /// Lookup target missing
    NotFound,

    /// Page busy: navigation in flight, execution context replaced, slow reply
    Transient,

    /// Protocol/transport failure talking to the browser
    Protocol,

    /// Session already closed or crashed
    SessionClosed,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriverErrorKind::Stale => "stale element",
            DriverErrorKind::NotInteractable => "not interactable",
            DriverErrorKind::NotFound => "not found",
            DriverErrorKind::Transient => "page busy",
            DriverErrorKind::Protocol => "protocol error",
            DriverErrorKind::SessionClosed => "session closed",
        };
        f.write_str(label)
    }
}

/// Error reported by a browser driver
#[derive(Debug, Error, Clone)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
    pub hint: Option<String>,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Protocol, message)
    }

    /// Transient errors mean "not yet" to a bounded wait.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::Stale | DriverErrorKind::NotFound | DriverErrorKind::Transient
        )
    }
}

/// Browser automation capability consumed by the engine
///
/// Implementations perform single attempts only; all waiting is done by the
/// engine's bounded waits so budgets stay under the engine's control.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Identifier of the live session
    fn session_id(&self) -> &SessionId;

    /// Navigate the page to `url`
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Look up one element; `Ok(None)` when nothing matches right now
    async fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, DriverError>;

    /// Dispatch an action against a resolved element
    async fn perform(&self, element: &ElementHandle, action: &Action) -> Result<(), DriverError>;

    /// Apply a transient visual marker (CSS border) to an element
    async fn mark(&self, element: &ElementHandle, border_css: &str) -> Result<(), DriverError>;

    /// Write a PNG screenshot of the current viewport to `path`
    async fn screenshot(&self, path: &Path) -> Result<(), DriverError>;

    /// Current page URL
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Current document title
    async fn title(&self) -> Result<String, DriverError>;

    /// Release the browser session
    async fn close(&self) -> Result<(), DriverError>;
}
