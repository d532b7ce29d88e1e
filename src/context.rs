//! The per-extension binding context.
//!
//! Every registered extension receives its own [`ExtensionContext`]: the
//! handle through which hooks reach pipeline state — path and URI
//! properties, the frozen template config, the current cycle's header — and
//! schedule further tasks. Accessors are scoped snapshots; nothing here lets
//! an extension mutate another extension's view.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::graph::WeakTaskGraph;
use crate::header::Header;
use crate::pipeline::{SharedState, StageValue};
use crate::properties::{PathProperties, UriProperties, uri_for};
use crate::tplinfo::TplInfo;

/// Pipeline accessors scoped to one registered extension.
///
/// The context holds a weak graph handle so that registry entries do not keep
/// the task graph (and every handler closure it stores) alive.
#[derive(Clone)]
pub struct ExtensionContext {
    tag: String,
    shared: Arc<SharedState>,
    tasks: WeakTaskGraph<StageValue>,
}

impl ExtensionContext {
    pub(crate) fn new(
        tag: String,
        shared: Arc<SharedState>,
        tasks: WeakTaskGraph<StageValue>,
    ) -> Self {
        Self { tag, shared, tasks }
    }

    /// The tag this extension was registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Snapshot of the current path roots.
    pub fn paths(&self) -> PathProperties {
        self.shared.paths_snapshot()
    }

    /// Snapshot of the current URI properties.
    pub fn uris(&self) -> UriProperties {
        self.shared.uris_snapshot()
    }

    /// Map a filesystem path to a URI under the base URI, relative to the
    /// current index root.
    pub fn uri_for(&self, fs_path: &str) -> String {
        let paths = self.shared.paths_snapshot();
        let uris = self.shared.uris_snapshot();
        uri_for(uris.base(), paths.index(), fs_path)
    }

    /// The frozen template config of the current cycle, if one has been
    /// parsed.
    pub fn tpl_info(&self) -> Option<Arc<TplInfo>> {
        self.shared.current_tpl_info()
    }

    /// The current cycle's header, if the header stage has run.
    ///
    /// Mutable during the header stage; treat as read-only from `on_build`
    /// onwards.
    pub fn header(&self) -> Option<Arc<Mutex<Header>>> {
        self.shared.current_header()
    }

    /// Invoke a named task on the pipeline's graph, starting a fresh
    /// cascade.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineClosed`] when the pipeline backing this context has
    /// been dropped; otherwise whatever the task call produces.
    pub async fn call_task(&self, name: &str, args: Vec<StageValue>) -> Result<StageValue> {
        let graph = self.tasks.upgrade().ok_or(Error::PipelineClosed)?;
        graph.call(name, args).await
    }
}
