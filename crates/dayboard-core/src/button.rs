use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::{ButtonConfig, ButtonKind};

/// A refresh trigger polled by the watch loop.
pub trait Button: Send {
    fn name(&self) -> &'static str;
    /// Reports a press at most once.
    fn is_pressed(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoButton;

impl Button for NoButton {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_pressed(&mut self) -> bool {
        false
    }
}

/// Pressed whenever the trigger file exists; the file is removed on read.
#[derive(Debug, Clone)]
pub struct TriggerFileButton {
    path: PathBuf,
}

impl TriggerFileButton {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Button for TriggerFileButton {
    fn name(&self) -> &'static str {
        "trigger-file"
    }

    fn is_pressed(&mut self) -> bool {
        if !self.path.exists() {
            return false;
        }

        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %err,
                "failed to consume trigger file"
            );
        }
        debug!(path = %self.path.display(), "button pressed");
        true
    }
}

pub fn select(cfg: &ButtonConfig) -> Box<dyn Button> {
    match (cfg.kind, &cfg.path) {
        (ButtonKind::TriggerFile, Some(path)) => {
            info!(path = %path.display(), "watching trigger file");
            Box::new(TriggerFileButton::new(path.clone()))
        }
        (ButtonKind::TriggerFile, None) => {
            warn!("trigger-file button without a path; button disabled");
            Box::new(NoButton)
        }
        (ButtonKind::Disabled, _) => Box::new(NoButton),
    }
}

/// Admits at most one render at a time without ever waiting.
#[derive(Debug, Clone, Default)]
pub struct RenderGate {
    lock: Arc<Mutex<()>>,
}

/// Held for the lifetime of one render; dropping it reopens the gate.
#[derive(Debug)]
pub struct RenderPermit {
    _guard: OwnedMutexGuard<()>,
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another permit is alive.
    pub fn try_acquire(&self) -> Option<RenderPermit> {
        match Arc::clone(&self.lock).try_lock_owned() {
            Ok(guard) => Some(RenderPermit { _guard: guard }),
            Err(_) => {
                debug!("render already in flight");
                None
            }
        }
    }

    /// Waits until no permit is alive.
    pub async fn drained(&self) {
        let _idle = self.lock.lock().await;
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
