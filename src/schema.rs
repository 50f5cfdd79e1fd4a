//! Schema types and structures

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Reserved key naming a document's type
pub const TYPE_KEY: &str = "type";

/// Reserved key holding a document's identifier
pub const ID_KEY: &str = "objectId";

/// Whether `key` is one of the two reserved markers
pub fn is_marker(key: &str) -> bool {
    key == TYPE_KEY || key == ID_KEY
}

/// A named field template.
///
/// Only the field *keys* matter: they decide which keys of a record are
/// loaded and written back. Template values are not type-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Type tag records carry in their `type` marker (e.g., "Person")
    pub name: String,
    /// Declared field keys, in document order, markers excluded
    pub fields: Vec<String>,
    /// File the schema was loaded from (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl Schema {
    /// Create a new schema
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(Into::into)
                .filter(|f: &String| !is_marker(f))
                .collect(),
            source_path: None,
        }
    }

    /// Build a schema from a parsed schema document.
    ///
    /// The document must be an object with a string `type` and an
    /// `objectId` template key. Every other key is a declared field.
    pub fn from_document(path: &Path, doc: &Value) -> Result<Self> {
        let missing = || StoreError::SchemaMissingMarkers {
            path: path.to_path_buf(),
        };

        let obj = doc.as_object().ok_or_else(missing)?;
        let name = obj
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(missing)?;
        if !obj.contains_key(ID_KEY) {
            return Err(missing());
        }

        let mut schema = Self::new(name, obj.keys().cloned());
        schema.source_path = Some(path.to_path_buf());
        Ok(schema)
    }

    /// Whether `key` participates in load/save
    pub fn declares(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f == key)
    }
}
