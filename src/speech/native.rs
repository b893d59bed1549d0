//! Local speech synthesis through a command-line synthesizer.

use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::text::preview;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NativeSynth: Send + Sync {
    /// Speak `text` and resolve when the utterance ends.
    /// A cancelled utterance resolves with `SpeechError::Cancelled`.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Stop the current utterance, if any.
    fn cancel(&self);
}

/// Runs `espeak-ng` (or any synthesizer taking the text as its last
/// argument) once per utterance.
pub struct CommandSynth {
    program: String,
    args: Vec<String>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandSynth {
    pub fn new(config: &SpeechConfig) -> Self {
        info!("Native speech via {}", config.native_command);
        Self {
            program: config.native_command.clone(),
            args: config.native_args.clone(),
            kill: Mutex::new(None),
        }
    }

    fn take_kill(&self) -> Option<oneshot::Sender<()>> {
        self.kill.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl NativeSynth for CommandSynth {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Native(format!("{} not available: {e}", self.program)))?;

        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self
            .kill
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx)
        {
            let _ = previous.send(());
        }

        debug!("{} speaking \"{}\"", self.program, preview(text, 40));

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| SpeechError::Native(e.to_string()))?;
                if status.success() {
                    Ok(())
                } else {
                    warn!("{} exited with {status}", self.program);
                    Err(SpeechError::Native(format!("{} exited with {status}", self.program)))
                }
            }
            _ = rx => {
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill {}: {e}", self.program);
                }
                Err(SpeechError::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        if let Some(tx) = self.take_kill() {
            let _ = tx.send(());
        }
    }
}
