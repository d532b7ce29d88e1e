//! The ordered extension registry.
//!
//! Built once, during pipeline construction: every requested name is resolved
//! through the caller-supplied [`ExtensionSet`], wrapped in an
//! [`ExtensionEntry`] carrying its tag and binding context, and given its
//! `on_create` hook if declared. Registration order is preserved and
//! load-bearing — every stage iterates entries in exactly this order, so
//! extensions may depend on header fields another extension wrote earlier.

use std::sync::Arc;

use tracing::debug;

use crate::context::ExtensionContext;
use crate::error::{Error, Result};
use crate::extension::{Capabilities, Extension, ExtensionSet};
use crate::graph::WeakTaskGraph;
use crate::pipeline::{SharedState, StageValue};

/// One registered extension: the capability object, its tag, and its binding
/// context.
pub struct ExtensionEntry {
    tag: String,
    extension: Arc<dyn Extension>,
    capabilities: Capabilities,
    context: ExtensionContext,
}

impl ExtensionEntry {
    /// The tag: the extension's self-identification, defaulting to the name
    /// it was requested under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The capability object itself.
    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    /// Declared capabilities, captured at registration.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// This extension's binding context.
    pub fn context(&self) -> &ExtensionContext {
        &self.context
    }
}

/// Ordered mapping from extension tag to registered extension.
pub struct ExtensionRegistry {
    entries: Vec<ExtensionEntry>,
}

impl ExtensionRegistry {
    /// Resolve and register every requested extension, in order.
    ///
    /// Invokes each extension's `on_create` hook (when declared) immediately
    /// after its registration, before the next extension is resolved.
    ///
    /// # Errors
    ///
    /// [`Error::ExtensionResolution`] when a name has no factory in `set`;
    /// [`Error::ExtensionHook`] when an `on_create` hook fails. Both abort
    /// pipeline construction.
    pub(crate) async fn load(
        names: &[String],
        set: &ExtensionSet,
        shared: &Arc<SharedState>,
        tasks: WeakTaskGraph<StageValue>,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(names.len());

        for name in names {
            let extension = set.resolve(name)?;
            let capabilities = extension.capabilities();
            let tag = extension.name().unwrap_or(name).to_string();
            let context = ExtensionContext::new(tag.clone(), Arc::clone(shared), tasks.clone());

            debug!(extension = %tag, ?capabilities, "registered extension");
            if capabilities.on_create {
                extension
                    .on_create(&context)
                    .await
                    .map_err(|err| Error::hook(&tag, "on_create", err))?;
            }

            entries.push(ExtensionEntry {
                tag,
                extension,
                capabilities,
                context,
            });
        }

        Ok(Self { entries })
    }

    /// Iterate entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionEntry> {
        self.entries.iter()
    }

    /// Look up an entry by tag.
    pub fn get(&self, tag: &str) -> Option<&ExtensionEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    /// Entry at a registration-order position.
    pub(crate) fn entry(&self, index: usize) -> &ExtensionEntry {
        &self.entries[index]
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no extensions are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
