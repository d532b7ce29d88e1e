//! tplbuild — asynchronous build orchestrator for multi-aspect site
//! templates.
//!
//! A central parsed configuration ("tpl info") drives an ordered set of
//! pluggable extensions that each contribute artifacts — markup, styles,
//! scripts, header metadata — for a site template. The heart of the crate is
//! a named-task dependency engine: build steps declare dependencies on other
//! steps by exact name or by segment-wildcard pattern, dependency results are
//! threaded into dependent handlers, and a file-change event can safely
//! re-trigger a cascading rebuild.
//!
//! # Architecture
//!
//! - [`pattern`] — dot-segmented task-name patterns with single-segment
//!   wildcards (`ext.*.buildHeader`)
//! - [`graph`] — the task registry: dependency declaration, call-time
//!   wildcard resolution, result threading, cycle detection, per-call
//!   cascade sharing
//! - [`extension`] — the optional-hook capability contract and the
//!   caller-supplied name → factory [`ExtensionSet`]
//! - [`registry`] — ordered extension registration with per-extension
//!   binding contexts
//! - [`context`] — the binding context extension hooks receive
//! - [`properties`] — path roots and derived URIs (validated keys only)
//! - [`tplinfo`] — config file loading and the frozen [`TplInfo`]
//! - [`header`] — the fresh-per-cycle shared header artifact
//! - [`pipeline`] — the `parseTplInfo` / `buildHeader` / `build` / `clean`
//!   task wiring
//! - [`watch`] — bridging an external filesystem watcher to the pipeline
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tplbuild::{BuildPipeline, Capabilities, Extension, ExtensionSet, Header};
//! use tplbuild::context::ExtensionContext;
//!
//! struct Css;
//!
//! #[async_trait::async_trait]
//! impl Extension for Css {
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities { on_build_header: true, on_build: true, ..Capabilities::NONE }
//!     }
//!
//!     async fn on_build_header(
//!         &self,
//!         _ctx: &ExtensionContext,
//!         header: &mut Header,
//!     ) -> anyhow::Result<()> {
//!         header.set("stylesheet", "main.css");
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> tplbuild::Result<()> {
//! let set = ExtensionSet::new().with("css", || Arc::new(Css));
//! let pipeline = BuildPipeline::new("tpl.json", ["css"], &set).await?;
//! pipeline.parse_tpl_info().await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod extension;
pub mod graph;
pub mod header;
pub mod pattern;
pub mod pipeline;
pub mod properties;
pub mod registry;
pub mod tplinfo;
pub mod watch;

pub use context::ExtensionContext;
pub use error::{Error, Result};
pub use extension::{Capabilities, Extension, ExtensionSet};
pub use graph::{TaskBuilder, TaskContext, TaskGraph, TaskInvocation};
pub use header::Header;
pub use pattern::TaskPattern;
pub use pipeline::{BuildPipeline, StageValue};
pub use properties::{PathProperties, UriProperties};
pub use registry::{ExtensionEntry, ExtensionRegistry};
pub use tplinfo::{TplConfig, TplInfo, TplPaths};
pub use watch::{ConfigWatchBridge, WatchEvent, WatchHandle, WatchKind};
