use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use which::which;

/// Configuration for launching the browser session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CdpConfig {
    /// Chrome/Chromium binary; detected when unset
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub launch_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub extra_args: Vec<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: None,
            headless: true,
            no_sandbox: true,
            window_width: 1920,
            window_height: 1080,
            launch_timeout_ms: 20_000,
            request_timeout_ms: 30_000,
            extra_args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-extensions".to_string(),
            ],
        }
    }
}

impl CdpConfig {
    /// Apply `UIFLOW_HEADLESS`, `UIFLOW_CHROME_PATH` and `UIFLOW_CHROME_PROFILE`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = env::var("UIFLOW_HEADLESS") {
            self.headless = parse_flag(&value).unwrap_or(self.headless);
        }
        if let Some(path) = non_empty_env("UIFLOW_CHROME_PATH") {
            self.executable = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_env("UIFLOW_CHROME_PROFILE") {
            self.user_data_dir = Some(PathBuf::from(path));
        }
        self
    }

    /// Configured binary if it exists, otherwise the first one found on the host
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        match &self.executable {
            Some(path) if path.exists() => Some(path.clone()),
            _ => detect_chrome_executable(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn detect_chrome_executable() -> Option<PathBuf> {
    if let Some(raw) = non_empty_env("UIFLOW_CHROME_PATH") {
        let candidate = PathBuf::from(raw);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    if non_empty_env("UIFLOW_SKIP_OS_PATHS").is_none() {
        for candidate in os_specific_chrome_paths() {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

pub(crate) fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Some(root) = non_empty_env(key) {
                let root = Path::new(&root);
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            Path::new("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome").to_path_buf(),
            Path::new("/Applications/Chromium.app/Contents/MacOS/Chromium").to_path_buf(),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        [
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
        ]
        .iter()
        .map(|p| Path::new(p).to_path_buf())
        .collect()
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        Vec::new()
    }
}
