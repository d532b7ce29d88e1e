//! Template configuration (`tpl.json`) loading and the frozen [`TplInfo`].
//!
//! The config file is read as UTF-8 and parsed as JSON. The parsed document
//! is frozen immediately: [`TplInfo`] exposes no mutating API and the
//! pipeline hands it to extensions behind an `Arc`, so nothing observed by an
//! extension can change for the remainder of that build cycle.
//!
//! Recognized structure is deliberately small: an optional top-level `config`
//! object with an optional `paths` object whose recognized keys are exactly
//! `index`, `front`, and `back`. Unrecognized keys at any level are ignored,
//! not errors — the rest of the document belongs to the extensions.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// The typed view of `config.paths`.
///
/// Every field is optional; absent keys leave the corresponding
/// [`PathProperties`](crate::properties::PathProperties) entry unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TplPaths {
    /// Overrides the `index` path root.
    pub index: Option<String>,
    /// Overrides the `front` path root.
    pub front: Option<String>,
    /// Overrides the `back` path root.
    pub back: Option<String>,
}

impl TplPaths {
    /// The present recognized overrides as `(key, value)` pairs, in config
    /// order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("index", self.index.as_deref()),
            ("front", self.front.as_deref()),
            ("back", self.back.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
    }
}

/// The typed view of the top-level `config` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TplConfig {
    /// Path root overrides.
    #[serde(default)]
    pub paths: TplPaths,
}

/// A parsed, frozen template configuration.
///
/// Holds the raw document (extensions read their own sections out of it) plus
/// the typed `config` view the pipeline itself consumes.
#[derive(Debug, Clone)]
pub struct TplInfo {
    raw: Value,
    config: Option<TplConfig>,
}

impl TplInfo {
    /// Parse config text into a frozen `TplInfo`.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigParse`] when the text is not valid JSON or the `config`
    /// section does not have the recognized shape. No state is mutated on
    /// failure.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let raw: Value =
            serde_json::from_str(text).map_err(|err| Error::config_parse(path, err))?;

        let config = match raw.get("config") {
            Some(section) => Some(
                TplConfig::deserialize(section)
                    .map_err(|err| Error::config_parse(path, err))?,
            ),
            None => None,
        };

        debug!(
            path = %path.display(),
            has_config = config.is_some(),
            "parsed template config"
        );
        Ok(Self { raw, config })
    }

    /// Read and parse the config file at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigRead`] when the file cannot be read, otherwise as
    /// [`TplInfo::parse`].
    pub async fn load(path: &Path) -> Result<Arc<Self>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Error::config_read(path, err))?;
        Ok(Arc::new(Self::parse(path, &text)?))
    }

    /// The whole parsed document.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The typed `config` section, if present.
    pub fn config(&self) -> Option<&TplConfig> {
        self.config.as_ref()
    }

    /// Look up a top-level key of the document.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}
