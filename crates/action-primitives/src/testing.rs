//! Scripted in-memory driver
//!
//! Element presence, URL and title are scripted against the tokio clock, so
//! tests running with paused time are fully deterministic. Every call is
//! logged in order for assertions on sequencing and evidence.

use crate::driver::{BrowserDriver, DriverError, DriverErrorKind};
use crate::types::{Action, ActionKind, Selector};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use uiflow_core_types::{ElementHandle, SessionId};

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    FindElement(Selector),
    Mark(ElementHandle),
    Perform(ElementHandle, ActionKind),
    Screenshot(PathBuf),
    CurrentUrl,
    Title,
    Close,
}

impl DriverCall {
    /// Lookups and reads are noise for ordering assertions
    pub fn is_probe(&self) -> bool {
        matches!(
            self,
            DriverCall::FindElement(_) | DriverCall::CurrentUrl | DriverCall::Title
        )
    }
}

#[derive(Debug, Default)]
struct Script {
    /// Selector -> delay after which the element appears
    elements: HashMap<Selector, Duration>,
    failing: HashMap<Selector, DriverErrorKind>,
    /// Selector -> errors returned by its next lookups, in order
    lookup_errors: HashMap<Selector, Vec<DriverErrorKind>>,
    panicking: Vec<Selector>,
    urls: Vec<(Duration, String)>,
    title: String,
    marker_supported: bool,
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<(Instant, DriverCall)>,
}

/// Scripted driver sharing its state across clones
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    session: SessionId,
    epoch: Instant,
    script: Arc<Mutex<Script>>,
    log: Arc<Mutex<Log>>,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedDriver {
    pub fn new() -> Self {
        let script = Script {
            urls: vec![(Duration::ZERO, "about:blank".to_string())],
            marker_supported: true,
            ..Script::default()
        };
        Self {
            session: SessionId::new(),
            epoch: Instant::now(),
            script: Arc::new(Mutex::new(script)),
            log: Arc::new(Mutex::new(Log::default())),
        }
    }

    /// Element present from the start
    pub fn with_element(self, selector: Selector) -> Self {
        self.with_element_after(selector, Duration::ZERO)
    }

    /// Element appears `delay` after the driver was created
    pub fn with_element_after(self, selector: Selector, delay: Duration) -> Self {
        lock(&self.script).elements.insert(selector, delay);
        self
    }

    /// Actions on this element fail with `kind`
    pub fn failing_action(self, selector: Selector, kind: DriverErrorKind) -> Self {
        lock(&self.script).failing.insert(selector, kind);
        self
    }

    /// The next `times` lookups of `selector` fail with `kind`
    pub fn failing_lookups(self, selector: Selector, kind: DriverErrorKind, times: usize) -> Self {
        lock(&self.script)
            .lookup_errors
            .entry(selector)
            .or_default()
            .extend(std::iter::repeat(kind).take(times));
        self
    }

    /// Actions on this element panic, simulating a driver crash
    pub fn panicking_action(self, selector: Selector) -> Self {
        lock(&self.script).panicking.push(selector);
        self
    }

    /// URL switches to `url` `delay` after creation
    pub fn with_url_after(self, url: impl Into<String>, delay: Duration) -> Self {
        {
            let mut script = lock(&self.script);
            script.urls.push((delay, url.into()));
            script.urls.sort_by_key(|(at, _)| *at);
        }
        self
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        lock(&self.script).title = title.into();
        self
    }

    pub fn without_marker_support(self) -> Self {
        lock(&self.script).marker_supported = false;
        self
    }

    /// Handle the driver returns for `selector`
    pub fn handle_for(&self, selector: &Selector) -> ElementHandle {
        ElementHandle::new(selector.to_string())
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.log).calls.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Calls excluding lookups and page reads
    pub fn significant_calls(&self) -> Vec<DriverCall> {
        self.calls().into_iter().filter(|c| !c.is_probe()).collect()
    }

    /// Elapsed time since creation at which call `index` happened
    pub fn call_time(&self, index: usize) -> Option<Duration> {
        lock(&self.log)
            .calls
            .get(index)
            .map(|(at, _)| at.duration_since(self.epoch))
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Screenshot(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn lookups(&self, selector: &Selector) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::FindElement(s) if s == selector))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Close))
            .count()
    }

    fn record(&self, call: DriverCall) {
        lock(&self.log).calls.push((Instant::now(), call));
    }

    fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.epoch)
    }

    fn selector_of(&self, element: &ElementHandle) -> Option<Selector> {
        lock(&self.script)
            .elements
            .keys()
            .find(|s| s.to_string() == element.as_str())
            .cloned()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    fn session_id(&self) -> &SessionId {
        &self.session
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(DriverCall::Navigate(url.to_string()));
        let at = self.elapsed();
        let mut script = lock(&self.script);
        script.urls.retain(|(when, _)| *when <= at);
        script.urls.push((at, url.to_string()));
        Ok(())
    }

    async fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, DriverError> {
        self.record(DriverCall::FindElement(selector.clone()));
        let elapsed = self.elapsed();
        let present = {
            let mut script = lock(&self.script);
            if let Some(pending) = script.lookup_errors.get_mut(selector) {
                if !pending.is_empty() {
                    let kind = pending.remove(0);
                    return Err(DriverError::new(kind, format!("lookup of {} interrupted", selector)));
                }
            }
            script
                .elements
                .get(selector)
                .map(|appears_after| elapsed >= *appears_after)
                .unwrap_or(false)
        };
        Ok(present.then(|| self.handle_for(selector)))
    }

    async fn perform(&self, element: &ElementHandle, action: &Action) -> Result<(), DriverError> {
        self.record(DriverCall::Perform(element.clone(), action.kind()));
        let Some(selector) = self.selector_of(element) else {
            return Err(DriverError::new(DriverErrorKind::Stale, "unknown element handle"));
        };
        let (failure, panics) = {
            let script = lock(&self.script);
            (
                script.failing.get(&selector).copied(),
                script.panicking.contains(&selector),
            )
        };
        if panics {
            panic!("scripted driver crash on {}", selector);
        }
        match failure {
            Some(kind) => Err(DriverError::new(kind, format!("{} rejected {}", selector, action.kind()))),
            None => Ok(()),
        }
    }

    async fn mark(&self, element: &ElementHandle, _border_css: &str) -> Result<(), DriverError> {
        if !lock(&self.script).marker_supported {
            return Err(DriverError::protocol("script execution disabled"));
        }
        self.record(DriverCall::Mark(element.clone()));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        self.record(DriverCall::Screenshot(path.to_path_buf()));
        tokio::fs::write(path, b"dummyimage")
            .await
            .map_err(|err| DriverError::protocol(format!("write {}: {}", path.display(), err)))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.record(DriverCall::CurrentUrl);
        let elapsed = self.elapsed();
        let script = lock(&self.script);
        Ok(script
            .urls
            .iter()
            .rev()
            .find(|(at, _)| *at <= elapsed)
            .map(|(_, url)| url.clone())
            .unwrap_or_default())
    }

    async fn title(&self) -> Result<String, DriverError> {
        self.record(DriverCall::Title);
        Ok(lock(&self.script).title.clone())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record(DriverCall::Close);
        Ok(())
    }
}
