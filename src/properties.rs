//! Plain configuration value containers: filesystem path roots and the URIs
//! derived from them.
//!
//! These are simple key/value holders with validated keys, not a design
//! focus: only the recognized path keys (`index`, `front`, `back`) can ever
//! mutate [`PathProperties`]; anything else is ignored without error.

use std::path::Path;

/// The named filesystem path roots of a template.
///
/// Each root defaults to `"./"` and is independently overwritable through the
/// template config's `config.paths` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathProperties {
    index: String,
    front: String,
    back: String,
}

impl PathProperties {
    /// The recognized path keys, in config order.
    pub const KEYS: [&'static str; 3] = ["index", "front", "back"];

    /// Root the template is served from.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Root of the front-of-site assets.
    pub fn front(&self) -> &str {
        &self.front
    }

    /// Root of the back-of-site assets.
    pub fn back(&self) -> &str {
        &self.back
    }

    /// Look up a root by key. `None` for unrecognized keys.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "index" => Some(&self.index),
            "front" => Some(&self.front),
            "back" => Some(&self.back),
            _ => None,
        }
    }

    /// Overwrite a root by key.
    ///
    /// Returns `true` when the key was recognized and applied; unrecognized
    /// keys are ignored and return `false`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        match key {
            "index" => self.index = value.into(),
            "front" => self.front = value.into(),
            "back" => self.back = value.into(),
            _ => return false,
        }
        true
    }
}

impl Default for PathProperties {
    fn default() -> Self {
        Self {
            index: "./".to_string(),
            front: "./".to_string(),
            back: "./".to_string(),
        }
    }
}

/// URIs a template exposes, derived from [`PathProperties`] relative to the
/// index root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriProperties {
    base: String,
    index: String,
    front: String,
}

impl UriProperties {
    /// Derive the URI set from a base URI and the current path roots.
    pub fn from_paths(base: &str, paths: &PathProperties) -> Self {
        Self {
            base: base.to_string(),
            index: uri_for(base, paths.index(), paths.index()),
            front: uri_for(base, paths.index(), paths.front()),
        }
    }

    /// The base URI everything else is resolved under.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// URI of the index root.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// URI of the front root.
    pub fn front(&self) -> &str {
        &self.front
    }
}

impl Default for UriProperties {
    fn default() -> Self {
        Self::from_paths("/", &PathProperties::default())
    }
}

/// Map a filesystem path to a URI under `base`, relative to the index root.
///
/// Paths outside the index root are appended as-is. Separators are
/// normalized to forward slashes.
pub fn uri_for(base: &str, index_root: &str, fs_path: &str) -> String {
    let relative = Path::new(fs_path)
        .strip_prefix(index_root)
        .unwrap_or_else(|_| Path::new(fs_path));
    let relative = relative.to_string_lossy().replace('\\', "/");
    format!("{base}{relative}")
}
