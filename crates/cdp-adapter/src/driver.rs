use std::path::Path;
use std::time::Duration;

use action_primitives::{Action, BrowserDriver, DriverError, DriverErrorKind, Selector};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uiflow_core_types::{ElementHandle, SessionId};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts::{self, ScriptReply};

struct BrowserState {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Browser driver backed by a locally launched Chromium
///
/// One driver owns one browser process and one page. `close` tears both
/// down; calling it again is a no-op.
pub struct ChromiumDriver {
    session: SessionId,
    page: Page,
    state: Mutex<Option<BrowserState>>,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page.
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let config = browser_config(cfg)?;
        info!(headless = cfg.headless, "Launching Chromium");

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::Launch, err))?;

        // Pump CDP messages for the lifetime of the browser
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler event loop ended");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(AdapterError::from_cdp(AdapterErrorKind::Launch, err));
            }
        };

        let session = SessionId::new();
        info!(session = %session, "Chromium session ready");
        Ok(Self {
            session,
            page,
            state: Mutex::new(Some(BrowserState { browser, handler })),
        })
    }

    async fn evaluate(&self, script: String) -> Result<ScriptReply, AdapterError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::Script, err))?;
        result.into_value::<ScriptReply>().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Script).with_hint(format!("unexpected reply: {err}"))
        })
    }

    /// Run a handle-scoped script, mapping a missing element to staleness
    async fn evaluate_on(&self, handle: &ElementHandle, script: String) -> Result<(), AdapterError> {
        let reply = self.evaluate(script).await?;
        if reply.ok {
            return Ok(());
        }
        match reply.error.as_deref() {
            Some("stale") => Err(stale(handle)),
            other => Err(AdapterError::new(AdapterErrorKind::Script)
                .with_hint(other.unwrap_or("script rejected").to_string())),
        }
    }

    async fn element(&self, handle: &ElementHandle) -> Result<Element, AdapterError> {
        self.page
            .find_element(scripts::handle_selector(handle.as_str()))
            .await
            .map_err(|_| stale(handle))
    }

    async fn dispatch(&self, handle: &ElementHandle, action: &Action) -> Result<(), DriverError> {
        let not_interactable = |err: chromiumoxide::error::CdpError| {
            DriverError::new(DriverErrorKind::NotInteractable, err.to_string())
        };
        match action {
            Action::Click => {
                self.element(handle).await?.click().await.map_err(not_interactable)?;
            }
            Action::Type { text } => {
                let element = self.element(handle).await?;
                element.focus().await.map_err(not_interactable)?;
                element.type_str(text).await.map_err(not_interactable)?;
            }
            Action::Clear => {
                self.evaluate_on(handle, scripts::clear(handle.as_str()))
                    .await?;
            }
            Action::Submit => {
                self.evaluate_on(handle, scripts::submit(handle.as_str()))
                    .await?;
            }
            Action::PressKey { key, repeat } => {
                let element = self.element(handle).await?;
                element.focus().await.map_err(not_interactable)?;
                for _ in 0..(*repeat).max(1) {
                    element.press_key(key).await.map_err(not_interactable)?;
                }
            }
        }
        Ok(())
    }
}

fn stale(handle: &ElementHandle) -> AdapterError {
    AdapterError::new(AdapterErrorKind::StaleElement)
        .with_hint(format!("{} is no longer attached", handle))
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder()
        .window_size(cfg.window_width, cfg.window_height)
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
        .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
        .args(cfg.extra_args.iter().cloned());
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    match cfg.resolve_executable() {
        Some(executable) => {
            debug!(executable = %executable.display(), "Using Chromium binary");
            builder = builder.chrome_executable(executable);
        }
        None => warn!("No Chromium binary detected, relying on chromiumoxide defaults"),
    }
    if let Some(dir) = &cfg.user_data_dir {
        builder = builder.user_data_dir(dir);
    }
    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Launch).with_hint(format!("invalid browser config: {err}"))
    })
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    fn session_id(&self) -> &SessionId {
        &self.session
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        url::Url::parse(url).map_err(|err| {
            DriverError::from(
                AdapterError::new(AdapterErrorKind::Navigation)
                    .with_hint(format!("invalid URL '{url}': {err}")),
            )
        })?;
        debug!(url = url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::Navigation, err))?;
        Ok(())
    }

    async fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, DriverError> {
        let reply = self.evaluate(scripts::locate(&selector.to_query())).await?;
        if !reply.ok {
            let reason = reply.error.unwrap_or_else(|| "lookup rejected".to_string());
            return Err(DriverError::protocol(format!("invalid selector {selector}: {reason}")));
        }
        Ok(reply.handle.map(ElementHandle::new))
    }

    async fn perform(&self, element: &ElementHandle, action: &Action) -> Result<(), DriverError> {
        self.dispatch(element, action).await
    }

    async fn mark(&self, element: &ElementHandle, border_css: &str) -> Result<(), DriverError> {
        self.evaluate_on(element, scripts::mark(element.as_str(), border_css))
            .await?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::CdpIo, err))?;
        tokio::fs::write(path, bytes).await.map_err(|err| {
            DriverError::protocol(format!("cannot write {}: {}", path.display(), err))
        })
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::CdpIo, err))?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, DriverError> {
        let result = self
            .page
            .evaluate("document.title")
            .await
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::Script, err))?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let Some(mut state) = self.state.lock().await.take() else {
            debug!(session = %self.session, "Session already closed");
            return Ok(());
        };
        info!(session = %self.session, "Shutting down Chromium");
        let closed = state.browser.close().await;
        if let Err(err) = state.browser.wait().await {
            warn!("Chromium did not exit cleanly: {}", err);
        }
        state.handler.abort();
        closed
            .map(|_| ())
            .map_err(|err| AdapterError::from_cdp(AdapterErrorKind::SessionClosed, err).into())
    }
}
