//! The shared per-cycle header artifact.
//!
//! A [`Header`] is created fresh by every `buildHeader` invocation and
//! progressively populated by extensions during the header stage (ordered by
//! registration, so later extensions can read fields earlier ones wrote).
//! Once the header stage completes, the build stage treats it as read-only
//! input. Each header carries a fresh id so two invocations never share an
//! identity.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

/// Mutable build-cycle artifact holding header metadata as ordered
/// string-keyed JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    id: Uuid,
    fields: BTreeMap<String, Value>,
}

impl Header {
    /// Create an empty header with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            fields: BTreeMap::new(),
        }
    }

    /// This header's identity. Distinct for every `buildHeader` invocation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Set a field, replacing any prior value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a field as a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Remove a field, returning its prior value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Iterate fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no extension contributed anything yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the fields as a JSON object (the id is identity, not content).
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
