//! Evidence store - one report directory per run, ordered screenshots

use crate::driver::BrowserDriver;
use crate::errors::ActionError;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Screenshot sink for a single workflow run
///
/// Files are named `<NN>_<label>.png` with a sequence number that only grows,
/// so a later capture can never overwrite an earlier one and directory order
/// equals capture order.
#[derive(Debug)]
pub struct EvidenceStore {
    dir: PathBuf,
    sequence: AtomicUsize,
}

impl EvidenceStore {
    /// Allocate `<root>/<label>_test_run_<YYYYmmdd_HHMMSS>` for a new run.
    pub fn create(root: &Path, label: &str) -> Result<Self, ActionError> {
        std::fs::create_dir_all(root).map_err(|err| {
            ActionError::ReportDir(format!("cannot create {}: {}", root.display(), err))
        })?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = format!("{}_test_run_{}", sanitize_label(label), timestamp);
        let mut dir = root.join(&base);
        let mut suffix = 1;
        while dir.exists() {
            dir = root.join(format!("{}_{}", base, suffix));
            suffix += 1;
        }

        std::fs::create_dir(&dir).map_err(|err| {
            ActionError::ReportDir(format!("cannot create {}: {}", dir.display(), err))
        })?;
        info!(dir = %dir.display(), "Allocated report directory");

        Ok(Self::open(dir))
    }

    /// Use an existing directory as the evidence sink.
    pub fn open(dir: PathBuf) -> Self {
        Self {
            dir,
            sequence: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of paths handed out so far
    pub fn captured(&self) -> usize {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Reserve the next evidence path for `label`.
    pub fn next_path(&self, label: &str) -> PathBuf {
        let index = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.dir
            .join(format!("{:02}_{}.png", index, sanitize_label(label)))
    }

    /// Capture the current viewport under `label`.
    pub async fn capture(
        &self,
        driver: &dyn BrowserDriver,
        label: &str,
    ) -> Result<PathBuf, ActionError> {
        let path = self.next_path(label);
        driver
            .screenshot(&path)
            .await
            .map_err(|err| ActionError::EvidenceFailed(format!("{}: {}", path.display(), err)))?;
        debug!(path = %path.display(), "Screenshot saved");
        Ok(path)
    }
}

/// Keep labels filesystem-safe: anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}
