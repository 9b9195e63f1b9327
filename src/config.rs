//! Runtime configuration
//!
//! Loaded from YAML (see `cli::runtime::load_config`), then adjusted from the
//! environment. Budgets here are only defaults for workflow files that omit
//! them; a loaded workflow carries every budget explicitly.

use action_primitives::{BoundedWait, MarkerStyle};
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root under which every run gets its own report directory
    pub reports_root: PathBuf,
    pub browser: BrowserSettings,
    pub engine: EngineSettings,
    pub defaults: StepDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reports_root: PathBuf::from("reports"),
            browser: BrowserSettings::default(),
            engine: EngineSettings::default(),
            defaults: StepDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1920,
            window_height: 1080,
            executable: None,
            user_data_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub poll_interval_ms: u64,
    /// How long the marker stays visible before the action
    pub mark_hold_ms: u64,
    pub marker_css: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            mark_hold_ms: 1000,
            marker_css: "3px solid red".to_string(),
        }
    }
}

/// Fill-ins for budgets a workflow file leaves out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDefaults {
    pub timeout_ms_primary: u64,
    pub timeout_ms_fallback: u64,
    pub post_action_wait_ms: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_ms_primary: 10_000,
            timeout_ms_fallback: 1000,
            post_action_wait_ms: 1000,
        }
    }
}

impl Config {
    /// Apply `UIFLOW_REPORTS_DIR`, `UIFLOW_HEADLESS` and `UIFLOW_CHROME_PATH`.
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = non_empty_env("UIFLOW_REPORTS_DIR") {
            info!("Using reports directory from UIFLOW_REPORTS_DIR: {}", dir);
            self.reports_root = PathBuf::from(dir);
        }
        if let Some(value) = non_empty_env("UIFLOW_HEADLESS") {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.browser.headless = true,
                "0" | "false" | "no" | "off" => self.browser.headless = false,
                _ => {}
            }
        }
        if let Some(path) = non_empty_env("UIFLOW_CHROME_PATH") {
            self.browser.executable = Some(PathBuf::from(path));
        }
    }

    pub fn waiter(&self) -> BoundedWait {
        BoundedWait::new(Duration::from_millis(self.engine.poll_interval_ms))
    }

    pub fn marker(&self) -> MarkerStyle {
        MarkerStyle {
            border_css: self.engine.marker_css.clone(),
            hold: Duration::from_millis(self.engine.mark_hold_ms),
        }
    }

    pub fn cdp_config(&self) -> CdpConfig {
        CdpConfig {
            executable: self.browser.executable.clone(),
            user_data_dir: self.browser.user_data_dir.clone(),
            headless: self.browser.headless,
            window_width: self.browser.window_width,
            window_height: self.browser.window_height,
            ..CdpConfig::default()
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "reports_root: out\nbrowser:\n  headless: true\ndefaults:\n  timeout_ms_primary: 5000\n",
        )
        .unwrap();
        assert_eq!(config.reports_root, PathBuf::from("out"));
        assert!(config.browser.headless);
        assert_eq!(config.browser.window_width, 1920);
        assert_eq!(config.defaults.timeout_ms_primary, 5000);
        assert_eq!(config.defaults.timeout_ms_fallback, 1000);
        assert_eq!(config.engine.marker_css, "3px solid red");
    }

    #[test]
    fn engine_settings_feed_the_executor() {
        let config = Config::default();
        assert_eq!(config.marker().hold, Duration::from_millis(1000));
        assert_eq!(config.waiter().poll_interval, Duration::from_millis(100));
        let cdp = config.cdp_config();
        assert!(!cdp.headless);
        assert_eq!((cdp.window_width, cdp.window_height), (1920, 1080));
    }
}
