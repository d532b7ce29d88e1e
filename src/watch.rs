//! Bridging an external filesystem watcher to the pipeline.
//!
//! The raw watcher (debouncing, OS event sources) is an external
//! collaborator; this module only defines the interface the pipeline needs
//! from it. Events arrive as [`WatchEvent`]s on a `tokio` mpsc channel; the
//! [`ConfigWatchBridge`] re-triggers `parseTplInfo` for every one of them. A
//! failed watcher-triggered cycle is logged and the loop continues — the
//! next event may succeed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::pipeline::BuildPipeline;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// The path appeared.
    Add,
    /// The path's contents changed.
    Change,
    /// The path disappeared.
    Unlink,
}

/// One filesystem event from the external watcher.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchKind,
    /// The path it happened to.
    pub path: PathBuf,
}

impl WatchEvent {
    /// Convenience constructor.
    pub fn new(kind: WatchKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Retargeting handle of the external watcher.
///
/// Implemented by the embedding application around whatever watcher it uses;
/// [`BuildPipeline::watch`] calls `update` with the config file's path.
pub trait WatchHandle {
    /// (Re)target the watcher at `path`.
    fn update(&mut self, path: &Path);
}

/// Drives a pipeline from a stream of watch events.
///
/// Every `add`/`change`/`unlink` event re-triggers a full `parseTplInfo`
/// cycle. The bridge runs on a spawned tokio task until the event channel
/// closes or [`ConfigWatchBridge::shutdown`] is called.
pub struct ConfigWatchBridge {
    task: JoinHandle<()>,
}

impl ConfigWatchBridge {
    /// Spawn the bridge loop.
    pub fn spawn(pipeline: Arc<BuildPipeline>, mut events: mpsc::Receiver<WatchEvent>) -> Self {
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!(
                    kind = ?event.kind,
                    path = %event.path.display(),
                    "config watch event"
                );
                if let Err(err) = pipeline.parse_tpl_info().await {
                    // Reported, not fatal: the watcher may retrigger on the
                    // next event.
                    error!(error = %err, "watch-triggered rebuild failed");
                }
            }
            debug!("config watch channel closed");
        });
        Self { task }
    }

    /// Whether the bridge loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the bridge without waiting for pending events.
    pub fn shutdown(self) {
        self.task.abort();
    }

    /// Wait for the bridge loop to finish (the event channel must close).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}
