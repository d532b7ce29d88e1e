//! The extension capability contract and the caller-supplied extension set.
//!
//! An extension contributes one aspect of a template (styles, scripts, header
//! metadata). Its hooks are all optional: presence is declared explicitly
//! through [`Capabilities`] and checked by the pipeline before each
//! invocation, so an extension only participates in the stages it declares.
//!
//! Extensions are resolved through an [`ExtensionSet`] — an explicit mapping
//! from extension name to factory supplied by the embedding application at
//! configuration time. The set is consulted once, during pipeline
//! construction; a requested name with no factory is fatal
//! ([`Error::ExtensionResolution`](crate::error::Error::ExtensionResolution)).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExtensionContext;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::tplinfo::TplInfo;

/// Which optional hooks an extension implements.
///
/// The pipeline registers an `ext.<tag>.<stage>` sub-task, and invokes the
/// corresponding hook, only for declared capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `on_create` runs once at registration, outside the build cycle.
    pub on_create: bool,
    /// `on_tpl_changed` runs after every successful config parse.
    pub on_tpl_changed: bool,
    /// `on_build_header` contributes to the shared header.
    pub on_build_header: bool,
    /// `on_build` produces the extension's build output.
    pub on_build: bool,
    /// `on_clean` removes the extension's build output.
    pub on_clean: bool,
}

impl Capabilities {
    /// No hooks at all.
    pub const NONE: Self = Self {
        on_create: false,
        on_tpl_changed: false,
        on_build_header: false,
        on_build: false,
        on_clean: false,
    };

    /// Every hook.
    pub const ALL: Self = Self {
        on_create: true,
        on_tpl_changed: true,
        on_build_header: true,
        on_build: true,
        on_clean: true,
    };
}

/// A pluggable build extension.
///
/// All hooks default to no-ops; implementors override the ones they declare
/// in [`Extension::capabilities`]. Hooks return `anyhow::Result` — a failure
/// fails the extension's sub-task and with it every dependent stage.
///
/// Hook invocation order within a stage is always registration order, and
/// the pipeline awaits each hook before starting the next, so an extension
/// may rely on header fields written by extensions registered before it.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Self-identification. Defaults to the name the extension was requested
    /// under.
    fn name(&self) -> Option<&str> {
        None
    }

    /// The hooks this extension implements.
    fn capabilities(&self) -> Capabilities;

    /// Setup hook, invoked once immediately after registration.
    async fn on_create(&self, _ctx: &ExtensionContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// The template config was re-parsed. `tpl_info` is frozen.
    async fn on_tpl_changed(
        &self,
        _ctx: &ExtensionContext,
        _tpl_info: &TplInfo,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Contribute to the cycle's header. Runs during the header stage; the
    /// header is mutable here and read-only afterwards.
    async fn on_build_header(
        &self,
        _ctx: &ExtensionContext,
        _header: &mut Header,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Produce build output from the finished header.
    async fn on_build(&self, _ctx: &ExtensionContext, _header: &Header) -> anyhow::Result<()> {
        Ok(())
    }

    /// Remove previously produced build output.
    async fn on_clean(&self, _ctx: &ExtensionContext) -> anyhow::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

type ExtensionFactory = Box<dyn Fn() -> Arc<dyn Extension> + Send + Sync>;

/// The name → factory mapping extensions are resolved from.
///
/// Replaces convention-based dynamic module loading with normal static
/// linking: the embedding application constructs each extension itself and
/// registers a factory under the name the pipeline will request.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tplbuild::extension::{Capabilities, Extension, ExtensionSet};
///
/// struct Css;
///
/// #[async_trait::async_trait]
/// impl Extension for Css {
///     fn capabilities(&self) -> Capabilities {
///         Capabilities { on_build_header: true, on_build: true, ..Capabilities::NONE }
///     }
/// }
///
/// let set = ExtensionSet::new().with("css", || Arc::new(Css));
/// assert!(set.contains("css"));
/// ```
#[derive(Default)]
pub struct ExtensionSet {
    factories: HashMap<String, ExtensionFactory>,
}

impl ExtensionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, consuming the builder.
    pub fn with<F, E>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<E> + Send + Sync + 'static,
        E: Extension + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Register a factory under `name`, replacing any prior one.
    pub fn register<F, E>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<E> + Send + Sync + 'static,
        E: Extension + 'static,
    {
        self.factories
            .insert(name.into(), Box::new(move || factory() as Arc<dyn Extension>));
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The registered names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the extension registered under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::ExtensionResolution`] when no factory is registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Extension>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(Error::ExtensionResolution {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ExtensionSet").field("names", &names).finish()
    }
}
