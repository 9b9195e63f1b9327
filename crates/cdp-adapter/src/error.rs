use action_primitives::{DriverError, DriverErrorKind};
use chromiumoxide::error::CdpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("navigation failed")]
    Navigation,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("element no longer attached")]
    StaleElement,
    #[error("page script failed")]
    Script,
    #[error("browser session closed")]
    SessionClosed,
}

/// Enriched error metadata passed back to the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    /// Classify a chromiumoxide error under `kind` unless it says more itself
    pub fn from_cdp(kind: AdapterErrorKind, err: CdpError) -> Self {
        let kind = match &err {
            CdpError::NotFound => AdapterErrorKind::TargetNotFound,
            CdpError::Timeout => AdapterErrorKind::CdpIo,
            _ => kind,
        };
        let hint = err.to_string();
        let retriable = matches!(kind, AdapterErrorKind::CdpIo) || is_context_loss(&hint);
        Self::new(kind).with_hint(hint).retriable(retriable)
    }
}

/// Messages Chromium sends while a page swaps its JavaScript context
const CONTEXT_LOSS_MARKERS: &[&str] = &[
    "execution context was destroyed",
    "cannot find context with specified id",
    "cannot find default execution context",
    "inspected target navigated or closed",
];

fn is_context_loss(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    CONTEXT_LOSS_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

impl From<AdapterError> for DriverError {
    fn from(err: AdapterError) -> Self {
        let kind = match err.kind {
            AdapterErrorKind::TargetNotFound => DriverErrorKind::NotFound,
            AdapterErrorKind::StaleElement => DriverErrorKind::Stale,
            AdapterErrorKind::SessionClosed => DriverErrorKind::SessionClosed,
            _ if err.retriable => DriverErrorKind::Transient,
            _ => DriverErrorKind::Protocol,
        };
        let message = err.hint.clone().unwrap_or_else(|| err.kind.to_string());
        DriverError::new(kind, message).with_hint(err.kind.to_string())
    }
}
