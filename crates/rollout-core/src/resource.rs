//! Unstructured resource objects rendered from templates.
//!
//! The engine does not own a typed view of every resource kind it applies;
//! rendered manifests are carried as JSON object trees with accessors for the
//! identity fields the engine cares about. Parsing accepts multi-document
//! YAML streams since one template commonly renders several manifests.

use serde_json::Value;

use crate::error::{EngineError, Result};

/// Identity of a resource object: enough to address it in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectKey {
    /// API version, e.g. `apps/v1`
    pub api_version: String,

    /// Resource kind, e.g. `Deployment`
    pub kind: String,

    /// Namespace, empty for cluster-scoped objects
    pub namespace: String,

    /// Object name
    pub name: String,
}

/// A rendered, unstructured resource object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceObject(Value);

impl ResourceObject {
    /// Wraps a JSON object tree.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when the value is not a JSON object or lacks
    /// the `kind` field.
    pub fn new(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(EngineError::fatal("rendered document is not an object"));
        }
        if value.get("kind").and_then(Value::as_str).is_none() {
            return Err(EngineError::fatal("rendered object has no kind"));
        }
        Ok(Self(value))
    }

    /// Parses every document of a (possibly multi-document) YAML stream.
    /// Empty documents are skipped.
    pub fn parse_yaml(rendered: &str) -> Result<Vec<Self>> {
        let mut objects = Vec::new();
        for document in serde_yaml::Deserializer::from_str(rendered) {
            let value: Value = serde::Deserialize::deserialize(document)
                .map_err(|e| EngineError::fatal(format!("failed to parse manifest: {e}")))?;
            if value.is_null() {
                continue;
            }
            objects.push(Self::new(value)?);
        }
        Ok(objects)
    }

    /// The raw JSON tree.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Mutable access to the raw JSON tree (used by the enhancer side).
    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// `apiVersion` field, defaulting to `v1`.
    pub fn api_version(&self) -> &str {
        self.0
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or("v1")
    }

    /// `kind` field; guaranteed present by construction.
    pub fn kind(&self) -> &str {
        self.0.get("kind").and_then(Value::as_str).unwrap_or("")
    }

    /// `metadata.name`, empty when unset.
    pub fn name(&self) -> &str {
        self.0
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// `metadata.namespace`, empty when unset.
    pub fn namespace(&self) -> &str {
        self.0
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Sets `metadata.name`, creating the metadata object if needed.
    pub fn set_name(&mut self, name: &str) {
        self.set_metadata_field("name", name);
    }

    /// Sets `metadata.namespace`, creating the metadata object if needed.
    pub fn set_namespace(&mut self, namespace: &str) {
        self.set_metadata_field("namespace", namespace);
    }

    fn set_metadata_field(&mut self, field: &str, value: &str) {
        // Construction guarantees the root is an object.
        if let Some(root) = self.0.as_object_mut() {
            let metadata = root
                .entry("metadata")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Some(map) = metadata.as_object_mut() {
                map.insert(field.to_string(), Value::String(value.to_string()));
            }
        }
    }

    /// Identity key for store lookups.
    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            api_version: self.api_version().to_string(),
            kind: self.kind().to_string(),
            namespace: self.namespace().to_string(),
            name: self.name().to_string(),
        }
    }
}
