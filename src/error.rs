//! Error types for the template build pipeline.
//!
//! The error system covers three layers of the crate:
//!
//! - **Setup errors** raised while constructing a pipeline:
//!   [`Error::ExtensionResolution`] when a requested extension is missing from
//!   the caller-supplied [`ExtensionSet`](crate::extension::ExtensionSet), and
//!   [`Error::ExtensionHook`] when an `on_create` hook fails.
//! - **Cycle errors** raised while a build cycle runs: [`Error::ConfigRead`]
//!   and [`Error::ConfigParse`] from the `parseTplInfo` stage, and
//!   [`Error::ExtensionHook`] from any extension hook invoked during the
//!   header, build, or clean stages.
//! - **Engine errors** from the task graph itself: [`Error::TaskNotFound`],
//!   [`Error::CircularDependency`], and [`Error::InvalidPattern`].
//!
//! Errors are `Clone` because a settled task result can be observed by several
//! dependents within one call cascade; underlying sources are therefore held
//! behind `Arc`. No error is retried anywhere in this crate: a failed task
//! reports to whatever awaited it, and a failed dependency prevents its
//! dependents from running.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Convenient result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the build pipeline and its task engine.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// A requested extension name has no factory in the extension set.
    ///
    /// Raised during pipeline construction; the pipeline cannot be built
    /// without every declared extension present.
    #[error("extension `{name}` is not present in the extension set")]
    ExtensionResolution {
        /// The extension name that could not be resolved.
        name: String,
    },

    /// The template config file could not be read.
    ///
    /// Fails the `parseTplInfo` invocation that attempted the read. The watch
    /// loop survives and may retrigger on the next filesystem event.
    #[error("cannot read template config `{path}`")]
    ConfigRead {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The template config file is not valid JSON.
    ///
    /// Carries the parser diagnostic. No pipeline state is mutated when this
    /// is raised.
    #[error("cannot parse template config `{path}`")]
    ConfigParse {
        /// Path of the config file.
        path: PathBuf,
        /// Parser diagnostic from `serde_json`.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// An extension hook returned an error.
    ///
    /// Fails the extension's sub-task, which fails every stage depending on
    /// it: `build` does not proceed if any `ext.*.buildHeader` sub-task
    /// failed.
    #[error("extension `{extension}` hook `{hook}` failed")]
    ExtensionHook {
        /// Tag of the extension whose hook failed.
        extension: String,
        /// Name of the failing hook.
        hook: &'static str,
        /// Error returned by the hook.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A task was invoked, or named as an exact dependency, without being
    /// registered.
    #[error("no task named `{name}` is registered")]
    TaskNotFound {
        /// The unregistered task name.
        name: String,
    },

    /// A task was reached again while still in flight within its own call
    /// cascade.
    #[error("circular task dependency: {cycle}")]
    CircularDependency {
        /// The invocation path that closed the cycle, rendered as
        /// `a -> b -> a`.
        cycle: String,
    },

    /// A dependency pattern failed to parse.
    #[error("invalid task pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A task handler needed the cycle's header, but no `buildHeader`
    /// invocation has produced one.
    #[error("no header is available; `buildHeader` has not run in this cycle")]
    HeaderUnavailable,

    /// The task graph backing an extension context has been dropped.
    #[error("the pipeline backing this context is no longer available")]
    PipelineClosed,
}

impl Error {
    /// Wrap an extension hook failure with its extension tag and hook name.
    pub(crate) fn hook(extension: impl Into<String>, hook: &'static str, source: anyhow::Error) -> Self {
        let source: Box<dyn std::error::Error + Send + Sync> = source.into();
        Self::ExtensionHook {
            extension: extension.into(),
            hook,
            source: Arc::from(source),
        }
    }

    /// Wrap a config read failure.
    pub(crate) fn config_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigRead {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Wrap a config parse failure.
    pub(crate) fn config_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::ConfigParse {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
