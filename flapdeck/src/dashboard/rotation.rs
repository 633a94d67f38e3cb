//! Timed cycling among dashboards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEntry {
    /// Dashboard to show.
    pub name: String,
    /// How long to show it.
    pub duration_secs: u64,
}

/// A named rotation: the entry list is persisted, the timer task is not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub rotation: Vec<RotationEntry>,
    #[serde(skip)]
    cancel: Option<CancellationToken>,
}

impl PartialEq for Rotation {
    fn eq(&self, other: &Self) -> bool {
        self.rotation == other.rotation
    }
}

impl Rotation {
    pub fn new(entries: Vec<RotationEntry>) -> Self {
        Self {
            rotation: entries,
            cancel: None,
        }
    }

    /// Start the timer task. The first entry's name is emitted immediately,
    /// then the index advances modulo the entry count on each entry's
    /// duration. A running timer is stopped first.
    pub fn start(&mut self, notifier: mpsc::Sender<String>) {
        self.stop();
        if self.rotation.is_empty() {
            return;
        }

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        let entries = self.rotation.clone();

        tokio::spawn(async move {
            let mut index = 0;
            if notifier.send(entries[index].name.clone()).await.is_err() {
                return;
            }
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("rotation timer stopped");
                        return;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(entries[index].duration_secs)) => {
                        index = (index + 1) % entries.len();
                        if notifier.send(entries[index].name.clone()).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Halt the timer. Safe when already stopped.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}
