//! Records
//!
//! A record is one schema-bound, file-backed document. Its property tree
//! holds plain JSON values; references to other records are stored as
//! identifier strings and only resolved on read (see [`crate::view`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::object_id::ObjectId;
use crate::registry::SchemaRegistry;
use crate::schema::{Schema, ID_KEY, TYPE_KEY};
use crate::source::FileSource;

/// A schema-typed document tracked by the store
#[derive(Debug, Clone)]
pub struct Record {
    id: ObjectId,
    path: PathBuf,
    schema: Arc<Schema>,
    props: Map<String, Value>,
}

impl Record {
    /// Create a record in memory. Nothing is written until [`Record::save`].
    pub fn new(schema: Arc<Schema>, id: ObjectId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
            schema,
            props: Map::new(),
        }
    }

    /// Parse raw file content into a record bound to a registered schema.
    ///
    /// Only schema-declared keys are loaded; anything else in the document
    /// is ignored.
    pub fn from_document(path: &Path, raw: &str, schemas: &SchemaRegistry) -> Result<Self> {
        let doc: Value =
            serde_json::from_str(raw).map_err(|e| StoreError::RecordMalformedSyntax {
                path: path.to_path_buf(),
                source: e,
            })?;

        let missing = || StoreError::RecordMissingMarkers {
            path: path.to_path_buf(),
        };
        let obj = doc.as_object().ok_or_else(missing)?;
        let type_name = obj.get(TYPE_KEY).and_then(Value::as_str).ok_or_else(missing)?;
        let raw_id = obj.get(ID_KEY).and_then(Value::as_str).ok_or_else(missing)?;

        let schema = schemas
            .get_shared(type_name)
            .ok_or_else(|| StoreError::RecordUnknownType {
                path: path.to_path_buf(),
                type_name: type_name.to_string(),
            })?;
        let id = ObjectId::parse(raw_id).ok_or_else(|| StoreError::InvalidObjectId {
            path: path.to_path_buf(),
            value: raw_id.to_string(),
        })?;

        let mut record = Self::new(schema, id, path);
        for field in &record.schema.fields {
            if let Some(value) = obj.get(field) {
                record.props.insert(field.clone(), value.clone());
            }
        }
        Ok(record)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored value for `key`, without reference resolution
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    /// Direct access to the property tree. Writes are not validated.
    pub fn props_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.props
    }

    /// Assign a property, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.props.insert(key.into(), value.into())
    }

    /// Point `key` at another record
    pub fn set_reference(&mut self, key: impl Into<String>, target: &Record) -> Option<Value> {
        self.set(key, target.id)
    }

    /// Keys currently held that would be dropped on save
    pub fn undeclared_keys(&self) -> Vec<&str> {
        self.props
            .keys()
            .filter(|k| !self.schema.declares(k))
            .map(String::as_str)
            .collect()
    }

    /// The document as it would be written: both markers, then declared
    /// fields in schema order.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(TYPE_KEY.to_string(), Value::String(self.schema.name.clone()));
        doc.insert(ID_KEY.to_string(), self.id.into());
        for field in &self.schema.fields {
            if let Some(value) = self.props.get(field) {
                doc.insert(field.clone(), value.clone());
            }
        }
        Value::Object(doc)
    }

    /// Pretty-printed file content
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Write the record to its path, creating or replacing the file.
    pub fn save(&self, source: &dyn FileSource) -> Result<()> {
        source.upsert(&self.path, &self.serialize()?)
    }

    /// Remove the backing file. A file that is already gone is not an error.
    pub fn delete(&self, source: &dyn FileSource) -> Result<()> {
        if source.exists(&self.path) {
            source.remove(&self.path)?;
        }
        Ok(())
    }

    /// Rename the backing file and follow it.
    pub fn move_to(&mut self, source: &dyn FileSource, new_path: impl Into<PathBuf>) -> Result<()> {
        let new_path = new_path.into();
        if new_path == self.path {
            return Ok(());
        }
        source.rename(&self.path, &new_path)?;
        self.path = new_path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FsSource;
    use serde_json::json;
    use tempfile::tempdir;

    const ADA: &str = "11111111-1111-4111-8111-111111111111";
    const BOB: &str = "22222222-2222-4222-8222-222222222222";

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.insert(Schema::new("Person", ["name", "friend", "address"]));
        registry
    }

    fn parse(raw: &Value) -> Result<Record> {
        Record::from_document(Path::new("people/ada.json"), &raw.to_string(), &registry())
    }

    #[test]
    fn test_from_document_loads_declared_fields_only() {
        let record = parse(&json!({
            "type": "Person",
            "objectId": ADA,
            "name": "Ada",
            "friend": BOB,
            "nickname": "Countess"
        }))
        .unwrap();

        assert_eq!(record.type_name(), "Person");
        assert_eq!(record.id().to_string(), ADA);
        assert_eq!(record.raw("name"), Some(&json!("Ada")));
        assert_eq!(record.raw("friend"), Some(&json!(BOB)));
        assert_eq!(record.raw("nickname"), None);
    }

    #[test]
    fn test_construction_failures() {
        let err = Record::from_document(Path::new("x.json"), "{ nope", &registry()).unwrap_err();
        assert!(matches!(err, StoreError::RecordMalformedSyntax { .. }));

        let err = parse(&json!({ "type": "Person", "name": "Ada" })).unwrap_err();
        assert!(matches!(err, StoreError::RecordMissingMarkers { .. }));

        let err = parse(&json!({ "objectId": ADA })).unwrap_err();
        assert!(matches!(err, StoreError::RecordMissingMarkers { .. }));

        let err = parse(&json!({ "type": "Robot", "objectId": ADA })).unwrap_err();
        assert!(matches!(err, StoreError::RecordUnknownType { ref type_name, .. } if type_name == "Robot"));

        let err = parse(&json!({ "type": "Person", "objectId": "ada" })).unwrap_err();
        assert!(matches!(err, StoreError::InvalidObjectId { .. }));
    }

    #[test]
    fn test_serialize_drops_undeclared_keys() {
        let mut record = parse(&json!({
            "type": "Person",
            "objectId": ADA,
            "address": { "city": "London", "lines": ["1 Main St"] },
            "name": "Ada"
        }))
        .unwrap();
        record.set("scratch", 42);
        assert_eq!(record.undeclared_keys(), vec!["scratch"]);

        let doc = record.to_document();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        // Markers first, then schema order rather than file order
        assert_eq!(keys, vec!["type", "objectId", "name", "address"]);
        assert!(doc.get("scratch").is_none());
        assert_eq!(doc["address"]["lines"][0], "1 Main St");
    }

    #[test]
    fn test_reference_serialized_as_id() {
        let schema = registry().get_shared("Person").unwrap();
        let bob = Record::new(schema.clone(), ObjectId::parse(BOB).unwrap(), "bob.json");
        let mut ada = Record::new(schema, ObjectId::parse(ADA).unwrap(), "ada.json");
        ada.set_reference("friend", &bob);

        assert_eq!(ada.to_document()["friend"], json!(BOB));
    }

    #[test]
    fn test_save_delete_move() {
        let dir = tempdir().unwrap();
        let source = FsSource::new(dir.path());
        let schema = registry().get_shared("Person").unwrap();
        let mut record = Record::new(schema, ObjectId::parse(ADA).unwrap(), "people/ada.json");
        record.set("name", "Ada");

        record.save(&source).unwrap();
        let reloaded =
            Record::from_document(record.path(), &source.read(record.path()).unwrap(), &registry())
                .unwrap();
        assert_eq!(reloaded.raw("name"), Some(&json!("Ada")));

        // Saving again replaces content in place
        record.set("name", "Ada Lovelace");
        record.save(&source).unwrap();
        assert!(source.read(record.path()).unwrap().contains("Ada Lovelace"));

        record.move_to(&source, "archive/ada.json").unwrap();
        assert_eq!(record.path(), Path::new("archive/ada.json"));
        assert!(!source.exists(Path::new("people/ada.json")));
        assert!(source.exists(Path::new("archive/ada.json")));

        record.delete(&source).unwrap();
        assert!(!source.exists(record.path()));
        // Already gone
        record.delete(&source).unwrap();
    }

    #[test]
    fn test_failed_move_keeps_path() {
        let dir = tempdir().unwrap();
        let source = FsSource::new(dir.path());
        let schema = registry().get_shared("Person").unwrap();
        let mut record = Record::new(schema, ObjectId::parse(ADA).unwrap(), "never-saved.json");

        assert!(record.move_to(&source, "elsewhere.json").is_err());
        assert_eq!(record.path(), Path::new("never-saved.json"));
    }
}
