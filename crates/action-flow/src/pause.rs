//! Pause points - human-in-the-loop suspension
//!
//! A pause step blocks until its pause point reports a resume. There is no
//! timeout; the only failure is a resume source that can never fire again.

use crate::errors::PauseInterrupted;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Pause point trait
#[async_trait]
pub trait PausePoint: Send + Sync {
    /// Block until resumed.
    async fn await_resume(&self, prompt: &str) -> Result<(), PauseInterrupted>;
}

/// Resumes immediately; used by unattended runs
#[derive(Debug, Clone, Default)]
pub struct ImmediateResume;

#[async_trait]
impl PausePoint for ImmediateResume {
    async fn await_resume(&self, prompt: &str) -> Result<(), PauseInterrupted> {
        info!(prompt = prompt, "Pause point resumed automatically");
        Ok(())
    }
}

type LineSource = Box<dyn AsyncBufRead + Send + Unpin>;

/// Waits for the operator to press Enter
///
/// One buffered reader serves every pause of the run, so lines typed ahead
/// of a pause are kept for it.
pub struct StdinPause {
    input: Mutex<LineSource>,
}

impl StdinPause {
    pub fn new() -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()))
    }

    /// Read resume lines from `reader` instead of stdin
    pub fn with_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(reader)),
        }
    }
}

impl Default for StdinPause {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PausePoint for StdinPause {
    async fn await_resume(&self, prompt: &str) -> Result<(), PauseInterrupted> {
        let mut stderr = tokio::io::stderr();
        let banner = format!("\n>>> {}\n>>> Press Enter to continue...\n", prompt);
        stderr
            .write_all(banner.as_bytes())
            .await
            .map_err(|err| PauseInterrupted(format!("cannot prompt operator: {}", err)))?;
        let _ = stderr.flush().await;

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|err| PauseInterrupted(format!("cannot read stdin: {}", err)))?;
        if read == 0 {
            return Err(PauseInterrupted("stdin closed before resume".to_string()));
        }
        info!("Operator resumed the run");
        Ok(())
    }
}

/// Pause point resumed through a [`ResumeHandle`]
///
/// A resume sent before the pause is reached is kept and consumed by the
/// next pause.
#[derive(Debug)]
pub struct ChannelPause {
    signals: Mutex<mpsc::UnboundedReceiver<()>>,
}

/// Sender side of a [`ChannelPause`]
#[derive(Debug, Clone)]
pub struct ResumeHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ChannelPause {
    pub fn new() -> (Self, ResumeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                signals: Mutex::new(rx),
            },
            ResumeHandle { tx },
        )
    }
}

impl ResumeHandle {
    /// Release one waiting pause; false once the pause point is gone
    pub fn resume(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl PausePoint for ChannelPause {
    async fn await_resume(&self, prompt: &str) -> Result<(), PauseInterrupted> {
        info!(prompt = prompt, "Waiting for resume signal");
        let mut signals = self.signals.lock().await;
        match signals.recv().await {
            Some(()) => Ok(()),
            None => Err(PauseInterrupted("resume channel closed".to_string())),
        }
    }
}
