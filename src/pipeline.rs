//! The build pipeline: task wiring and header/extension orchestration.
//!
//! A [`BuildPipeline`] composes four named tasks — `parseTplInfo`,
//! `buildHeader`, `build`, `clean` — plus one `ext.<tag>.<stage>` sub-task
//! per declared extension capability, out of [`TaskGraph`] primitives and
//! registry capability checks. It owns the mutable shared state of a build
//! cycle: the path/URI properties, the frozen template config, and the
//! header slot.
//!
//! # Build cycle
//!
//! One cycle is the cascade
//! `parseTplInfo → buildHeader → {ext header hooks}* → build → {ext build hooks}*`:
//!
//! 1. `parseTplInfo` reads and parses the config file, applies recognized
//!    `config.paths` keys, freezes the parsed document, notifies every
//!    `on_tpl_changed` extension in registration order, then triggers the
//!    downstream stages.
//! 2. `buildHeader` creates a fresh [`Header`], installs it in the shared
//!    slot, and runs each `ext.<tag>.buildHeader` sub-task sequentially in
//!    registration order, settling with the header as its result.
//! 3. `build` declares dependencies on `buildHeader` (to obtain the finished
//!    header) and on `ext.*.buildHeader` (so no build hook can run before
//!    every header contribution has settled — cascade sharing means
//!    contributions already performed inside `buildHeader` are not re-run).
//!    It then runs each `ext.<tag>.build` sub-task in registration order.
//! 4. `clean` waits on `ext.*.clean`, running every declared cleanup hook in
//!    registration order.
//!
//! The original push-style trigger chain (`buildHeader` firing `build` from
//! inside its handler) cannot terminate when `build` also *depends on*
//! `buildHeader`, so the chain is realized pull-style: `parseTplInfo`
//! triggers `build`, whose dependencies pull the header stage. The observable
//! stage order is unchanged.
//!
//! # Overlapping cycles
//!
//! A filesystem event may arrive while a previous cycle is still settling.
//! Externally triggered cycles are serialized by a single cycle guard:
//! overlapping triggers queue instead of racing on the shared header slot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::extension::ExtensionSet;
use crate::graph::TaskGraph;
use crate::header::Header;
use crate::properties::{PathProperties, UriProperties};
use crate::registry::ExtensionRegistry;
use crate::tplinfo::{TplInfo, TplPaths};

/// Task name of the config parse stage.
pub const TASK_PARSE_TPL_INFO: &str = "parseTplInfo";
/// Task name of the header stage.
pub const TASK_BUILD_HEADER: &str = "buildHeader";
/// Task name of the build stage.
pub const TASK_BUILD: &str = "build";
/// Task name of the clean stage.
pub const TASK_CLEAN: &str = "clean";

/// Sub-task name for one extension's contribution to a stage.
pub fn ext_task(tag: &str, stage: &str) -> String {
    format!("ext.{tag}.{stage}")
}

/// Values threaded between the pipeline's tasks.
#[derive(Debug, Clone, Default)]
pub enum StageValue {
    /// Nothing to thread.
    #[default]
    Unit,
    /// The frozen template config.
    TplInfo(Arc<TplInfo>),
    /// The current cycle's shared header.
    Header(Arc<Mutex<Header>>),
}

impl StageValue {
    /// The frozen config, if that is what this value carries.
    pub fn as_tpl_info(&self) -> Option<Arc<TplInfo>> {
        match self {
            Self::TplInfo(info) => Some(Arc::clone(info)),
            _ => None,
        }
    }

    /// The shared header, if that is what this value carries.
    pub fn as_header(&self) -> Option<Arc<Mutex<Header>>> {
        match self {
            Self::Header(header) => Some(Arc::clone(header)),
            _ => None,
        }
    }
}

/// Pipeline state shared between task handlers and extension contexts.
///
/// The header slot is a `tokio::sync::Mutex` because extension hooks hold it
/// across await points; the lock exists for memory safety, not as a
/// concurrency license — hook invocation is sequenced by the pipeline, and
/// parallelizing it would violate the registration-order invariant.
pub(crate) struct SharedState {
    tpl_path: PathBuf,
    paths: StdMutex<PathProperties>,
    uris: StdMutex<UriProperties>,
    tpl_info: StdMutex<Option<Arc<TplInfo>>>,
    header: StdMutex<Option<Arc<Mutex<Header>>>>,
}

impl SharedState {
    fn new(tpl_path: PathBuf) -> Self {
        let paths = PathProperties::default();
        let uris = UriProperties::from_paths("/", &paths);
        Self {
            tpl_path,
            paths: StdMutex::new(paths),
            uris: StdMutex::new(uris),
            tpl_info: StdMutex::new(None),
            header: StdMutex::new(None),
        }
    }

    pub(crate) fn tpl_path(&self) -> &Path {
        &self.tpl_path
    }

    pub(crate) fn paths_snapshot(&self) -> PathProperties {
        self.paths.lock().unwrap().clone()
    }

    pub(crate) fn uris_snapshot(&self) -> UriProperties {
        self.uris.lock().unwrap().clone()
    }

    pub(crate) fn current_tpl_info(&self) -> Option<Arc<TplInfo>> {
        self.tpl_info.lock().unwrap().clone()
    }

    pub(crate) fn current_header(&self) -> Option<Arc<Mutex<Header>>> {
        self.header.lock().unwrap().clone()
    }

    fn set_tpl_info(&self, info: Arc<TplInfo>) {
        *self.tpl_info.lock().unwrap() = Some(info);
    }

    fn set_header(&self, header: Arc<Mutex<Header>>) {
        *self.header.lock().unwrap() = Some(header);
    }

    /// Apply the recognized path overrides, then re-derive the URI set.
    fn apply_paths(&self, overrides: &TplPaths) {
        let mut paths = self.paths.lock().unwrap();
        for (key, value) in overrides.entries() {
            paths.set(key, value);
            debug!(key, value, "path root updated from config");
        }
        let mut uris = self.uris.lock().unwrap();
        *uris = UriProperties::from_paths(uris.base(), &paths);
    }
}

/// The assembled build orchestrator.
///
/// Constructed from a config-file path, an ordered list of extension names,
/// and the [`ExtensionSet`] those names are resolved from. The extension set
/// is a construction-time decision; there is no runtime hot-reload.
pub struct BuildPipeline {
    shared: Arc<SharedState>,
    registry: Arc<ExtensionRegistry>,
    graph: TaskGraph<StageValue>,
    cycle_guard: Mutex<()>,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline").finish_non_exhaustive()
    }
}

impl BuildPipeline {
    /// Construct a pipeline.
    ///
    /// Resolves every requested extension (in the given order — the caller's
    /// list is authoritative), runs declared `on_create` hooks, and registers
    /// all pipeline tasks.
    ///
    /// # Errors
    ///
    /// [`Error::ExtensionResolution`] when a name has no factory in `set`;
    /// [`Error::ExtensionHook`] when an `on_create` hook fails.
    pub async fn new(
        tpl_path: impl Into<PathBuf>,
        extensions: impl IntoIterator<Item = impl Into<String>>,
        set: &ExtensionSet,
    ) -> Result<Self> {
        let names: Vec<String> = extensions.into_iter().map(Into::into).collect();
        let shared = Arc::new(SharedState::new(tpl_path.into()));
        let graph: TaskGraph<StageValue> = TaskGraph::new();

        let registry = Arc::new(
            ExtensionRegistry::load(&names, set, &shared, graph.downgrade()).await?,
        );
        register_tasks(&graph, &shared, &registry)?;

        info!(
            path = %shared.tpl_path().display(),
            extensions = registry.len(),
            "build pipeline created"
        );
        Ok(Self {
            shared,
            registry,
            graph,
            cycle_guard: Mutex::new(()),
        })
    }

    /// Read, parse, and apply the template config, then run a full build
    /// cycle. Serialized against other externally triggered cycles.
    pub async fn parse_tpl_info(&self) -> Result<()> {
        let _cycle = self.cycle_guard.lock().await;
        self.graph
            .call(TASK_PARSE_TPL_INFO, Vec::new())
            .await
            .map(drop)
    }

    /// Run the header stage alone: fresh header plus every extension's
    /// header contribution, in registration order.
    pub async fn build_header(&self) -> Result<()> {
        let _cycle = self.cycle_guard.lock().await;
        self.graph
            .call(TASK_BUILD_HEADER, Vec::new())
            .await
            .map(drop)
    }

    /// Run the header and build stages.
    pub async fn build(&self) -> Result<()> {
        let _cycle = self.cycle_guard.lock().await;
        self.graph.call(TASK_BUILD, Vec::new()).await.map(drop)
    }

    /// Run every extension's cleanup hook, in registration order.
    pub async fn clean(&self) -> Result<()> {
        let _cycle = self.cycle_guard.lock().await;
        self.graph.call(TASK_CLEAN, Vec::new()).await.map(drop)
    }

    /// (Re)target an external watcher handle at the config file's path.
    pub fn watch<W: crate::watch::WatchHandle + ?Sized>(&self, handle: &mut W) {
        handle.update(self.shared.tpl_path());
    }

    /// The config file this pipeline parses.
    pub fn tpl_path(&self) -> &Path {
        self.shared.tpl_path()
    }

    /// Snapshot of the current path roots.
    pub fn paths(&self) -> PathProperties {
        self.shared.paths_snapshot()
    }

    /// Snapshot of the current URI properties.
    pub fn uris(&self) -> UriProperties {
        self.shared.uris_snapshot()
    }

    /// The most recently parsed (frozen) template config.
    pub fn tpl_info(&self) -> Option<Arc<TplInfo>> {
        self.shared.current_tpl_info()
    }

    /// The current cycle's header, once a header stage has run.
    pub fn header(&self) -> Option<Arc<Mutex<Header>>> {
        self.shared.current_header()
    }

    /// The registered extensions, in registration order.
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// The underlying task graph, for drivers that invoke tasks directly.
    pub fn tasks(&self) -> &TaskGraph<StageValue> {
        &self.graph
    }
}

/// Register the four pipeline tasks and every capability sub-task.
///
/// Sub-tasks are registered in extension registration order, so wildcard
/// dependency resolution yields them in that order.
fn register_tasks(
    graph: &TaskGraph<StageValue>,
    shared: &Arc<SharedState>,
    registry: &Arc<ExtensionRegistry>,
) -> Result<()> {
    for (index, entry) in registry.iter().enumerate() {
        let capabilities = entry.capabilities();
        let tag = entry.tag().to_string();

        if capabilities.on_build_header {
            let shared = Arc::clone(shared);
            let registry = Arc::clone(registry);
            graph.create(ext_task(&tag, TASK_BUILD_HEADER), move |_ctx, inv| {
                let shared = Arc::clone(&shared);
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    let slot = inv
                        .args
                        .first()
                        .and_then(StageValue::as_header)
                        .or_else(|| shared.current_header())
                        .ok_or(Error::HeaderUnavailable)?;
                    let entry = registry.entry(index);
                    let mut header = slot.lock().await;
                    entry
                        .extension()
                        .on_build_header(entry.context(), &mut header)
                        .await
                        .map_err(|err| Error::hook(entry.tag(), "on_build_header", err))?;
                    Ok(StageValue::Unit)
                })
            });
        }

        if capabilities.on_build {
            let shared = Arc::clone(shared);
            let registry = Arc::clone(registry);
            graph.create(ext_task(&tag, TASK_BUILD), move |_ctx, inv| {
                let shared = Arc::clone(&shared);
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    let slot = inv
                        .args
                        .first()
                        .and_then(StageValue::as_header)
                        .or_else(|| shared.current_header())
                        .ok_or(Error::HeaderUnavailable)?;
                    let entry = registry.entry(index);
                    let header = slot.lock().await;
                    entry
                        .extension()
                        .on_build(entry.context(), &header)
                        .await
                        .map_err(|err| Error::hook(entry.tag(), "on_build", err))?;
                    Ok(StageValue::Unit)
                })
            });
        }

        if capabilities.on_clean {
            let registry = Arc::clone(registry);
            graph.create(ext_task(&tag, TASK_CLEAN), move |_ctx, _inv| {
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    let entry = registry.entry(index);
                    entry
                        .extension()
                        .on_clean(entry.context())
                        .await
                        .map_err(|err| Error::hook(entry.tag(), "on_clean", err))?;
                    Ok(StageValue::Unit)
                })
            });
        }
    }

    {
        let shared = Arc::clone(shared);
        let registry = Arc::clone(registry);
        graph.create(TASK_PARSE_TPL_INFO, move |ctx, _inv| {
            let shared = Arc::clone(&shared);
            let registry = Arc::clone(&registry);
            Box::pin(async move {
                let tpl_info = TplInfo::load(shared.tpl_path()).await?;
                if let Some(config) = tpl_info.config() {
                    shared.apply_paths(&config.paths);
                }
                // Frozen before any extension observes it.
                shared.set_tpl_info(Arc::clone(&tpl_info));
                info!(path = %shared.tpl_path().display(), "parsed template config");

                for entry in registry.iter() {
                    if !entry.capabilities().on_tpl_changed {
                        continue;
                    }
                    entry
                        .extension()
                        .on_tpl_changed(entry.context(), &tpl_info)
                        .await
                        .map_err(|err| Error::hook(entry.tag(), "on_tpl_changed", err))?;
                }

                ctx.call(TASK_BUILD, vec![StageValue::TplInfo(Arc::clone(&tpl_info))])
                    .await?;
                Ok(StageValue::TplInfo(tpl_info))
            })
        });
    }

    {
        let shared = Arc::clone(shared);
        let registry = Arc::clone(registry);
        graph.create(TASK_BUILD_HEADER, move |ctx, inv| {
            let shared = Arc::clone(&shared);
            let registry = Arc::clone(&registry);
            Box::pin(async move {
                let tpl_info = inv
                    .args
                    .first()
                    .and_then(StageValue::as_tpl_info)
                    .or_else(|| shared.current_tpl_info());
                info!(has_tpl_info = tpl_info.is_some(), "building header");

                let header = Arc::new(Mutex::new(Header::new()));
                shared.set_header(Arc::clone(&header));

                for entry in registry.iter() {
                    if !entry.capabilities().on_build_header {
                        continue;
                    }
                    ctx.call(
                        &ext_task(entry.tag(), TASK_BUILD_HEADER),
                        vec![StageValue::Header(Arc::clone(&header))],
                    )
                    .await?;
                }

                Ok(StageValue::Header(header))
            })
        });
    }

    {
        let registry = Arc::clone(registry);
        graph
            .create(TASK_BUILD, move |ctx, inv| {
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    let header = inv
                        .deps
                        .first()
                        .and_then(|results| results.first())
                        .and_then(StageValue::as_header)
                        .ok_or(Error::HeaderUnavailable)?;
                    info!("building");

                    for entry in registry.iter() {
                        if !entry.capabilities().on_build {
                            continue;
                        }
                        ctx.call(
                            &ext_task(entry.tag(), TASK_BUILD),
                            vec![StageValue::Header(Arc::clone(&header))],
                        )
                        .await?;
                    }

                    Ok(StageValue::Unit)
                })
            })
            .wait_for(TASK_BUILD_HEADER)?
            .wait_for("ext.*.buildHeader")?;
    }

    graph
        .create(TASK_CLEAN, |_ctx, _inv| {
            Box::pin(async move {
                info!("cleaned");
                Ok(StageValue::Unit)
            })
        })
        .wait_for("ext.*.clean")?;

    Ok(())
}
