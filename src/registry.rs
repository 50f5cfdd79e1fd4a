//! Schema Registry
//!
//! Maps type names to field templates loaded from a schema directory.
//! Immutable once loaded; reloading means building a new registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::schema::Schema;
use crate::source::FileSource;

/// Type name → schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every schema file directly inside `dir`.
    ///
    /// Files that cannot be read or parsed are skipped with a warning. A
    /// parsed file without the reserved markers aborts the load. When two files declare
    /// the same type, the later one (by file name) wins.
    pub fn load(source: &dyn FileSource, dir: &Path, extension: &str) -> Result<Self> {
        let mut registry = Self::new();

        if !source.is_dir(dir) {
            warn!("Schema directory {} does not exist", dir.display());
            return Ok(registry);
        }

        let listing = source.list_files(dir, false)?;
        for (path, err) in &listing.unreadable {
            warn!("Skipping schema entry {}: {}", path.display(), err);
        }

        for path in listing.files {
            if !has_extension(&path, extension) {
                continue;
            }

            let content = match source.read(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable schema {}: {}", path.display(), e);
                    continue;
                }
            };
            let doc: serde_json::Value = match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    let err = StoreError::SchemaMalformedSyntax { path, source: e };
                    warn!("Skipping schema: {}", err);
                    continue;
                }
            };

            let schema = Schema::from_document(&path, &doc)?;
            debug!("Loaded schema {} from {}", schema.name, path.display());
            registry.insert(schema);
        }

        Ok(registry)
    }

    /// Register a schema, replacing any previous one with the same name
    pub fn insert(&mut self, schema: Schema) -> Option<Arc<Schema>> {
        let previous = self.schemas.insert(schema.name.clone(), Arc::new(schema));
        if let Some(prev) = &previous {
            debug!("Schema {} overridden", prev.name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name).map(Arc::as_ref)
    }

    /// Shared handle for records bound to this schema
    pub(crate) fn get_shared(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.schemas.iter().map(|(name, schema)| (name.as_str(), schema.as_ref()))
    }

    /// Type names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
