//! Record Store
//!
//! Owns every live [`Record`] and the schema registry. Builds from a full
//! scan of the records directory, then stays current by applying file
//! change events one at a time.
//!
//! All cache mutation takes `&mut self`, so a lookup-by-path, remove,
//! reconstruct, insert sequence can never interleave with another one.
//! Callers that share a store across threads wrap it in a lock.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::object_id::ObjectId;
use crate::record::Record;
use crate::registry::{has_extension, SchemaRegistry};
use crate::source::FileSource;
use crate::view::RecordRef;

/// Kind of out-of-band change reported for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Modify,
    Rename,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Modify => write!(f, "modify"),
            ChangeAction::Rename => write!(f, "rename"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// Where schemas and records live inside the file source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    /// Directory of schema files (not scanned recursively)
    pub schema_dir: PathBuf,
    /// Root of the record tree (scanned recursively)
    pub records_dir: PathBuf,
    /// Extension of structured-data files
    pub extension: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from("schemas"),
            records_dir: PathBuf::from("records"),
            extension: "json".to_string(),
        }
    }
}

/// One file that could not become a record
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: StoreError,
}

/// Outcome of [`RecordStore::build_cache`]
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Number of schemas registered
    pub schemas: usize,
    /// Number of records loaded
    pub loaded: usize,
    /// Files skipped, with the reason
    pub failures: Vec<LoadFailure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What to do when a loaded identifier is already owned by another path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnDuplicate {
    /// Keep the existing owner and fail this file
    Reject,
    /// The file being loaded takes over the identifier, provided the
    /// current owner's file no longer exists
    Supersede,
}

/// The authoritative identifier → record cache
pub struct RecordStore {
    source: Arc<dyn FileSource>,
    layout: StoreLayout,
    schemas: SchemaRegistry,
    records: HashMap<ObjectId, Record>,
}

impl RecordStore {
    /// Create an empty store. Nothing is read until [`RecordStore::build_cache`].
    pub fn new(source: Arc<dyn FileSource>, layout: StoreLayout) -> Self {
        Self {
            source,
            layout,
            schemas: SchemaRegistry::new(),
            records: HashMap::new(),
        }
    }

    pub fn source(&self) -> &dyn FileSource {
        self.source.as_ref()
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Load schemas, then every record under the records directory.
    ///
    /// Any previous contents are dropped first. Only a schema without its
    /// reserved markers fails the whole build; per-record problems land in
    /// the report and do not stop the scan.
    pub fn build_cache(&mut self) -> Result<BuildReport> {
        self.clear();
        self.schemas = SchemaRegistry::load(
            self.source.as_ref(),
            &self.layout.schema_dir,
            &self.layout.extension,
        )?;

        let mut report = BuildReport {
            schemas: self.schemas.len(),
            ..Default::default()
        };

        if !self.source.is_dir(&self.layout.records_dir) {
            info!(
                "Records directory {} not found, store is empty",
                self.layout.records_dir.display()
            );
            return Ok(report);
        }

        let listing = self.source.list_files(&self.layout.records_dir, true)?;
        for (path, error) in listing.unreadable {
            warn!("Unreadable entry {}: {}", path.display(), error);
            report.failures.push(LoadFailure { path, error });
        }

        for path in listing.files {
            if !self.is_record_path(&path) {
                continue;
            }
            match self.load_file(&path, OnDuplicate::Reject) {
                Ok(_) => report.loaded += 1,
                Err(error) => {
                    warn!("Skipping record: {}", error);
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        info!(
            "Built cache: {} schemas, {} records, {} failures",
            report.schemas,
            report.loaded,
            report.failures.len()
        );
        Ok(report)
    }

    /// Drop every record and schema
    pub fn clear(&mut self) {
        self.records.clear();
        self.schemas = SchemaRegistry::new();
    }

    /// Look up a live record by identifier
    pub fn get(&self, id: ObjectId) -> Option<RecordRef<'_>> {
        self.records.get(&id).map(|r| RecordRef::new(self, r))
    }

    /// Look up a live record by identifier string. Anything that is not a
    /// version-4 UUID simply finds nothing.
    pub fn get_record(&self, id: &str) -> Option<RecordRef<'_>> {
        ObjectId::parse(id).and_then(|id| self.get(id))
    }

    /// Mutable access for property writes
    pub fn record_mut(&mut self, id: ObjectId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    pub fn get_schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn find_by_path(&self, path: &Path) -> Option<RecordRef<'_>> {
        self.records
            .values()
            .find(|r| r.path() == path)
            .map(|r| RecordRef::new(self, r))
    }

    pub fn records_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = RecordRef<'a>> + 'a {
        self.iter().filter(move |r| r.type_name() == type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = RecordRef<'_>> {
        self.records.values().map(move |r| RecordRef::new(self, r))
    }

    /// Identifiers of all live records, sorted
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply one out-of-band change.
    ///
    /// Directories are expanded to the files beneath them. Modify and
    /// Rename both replace whatever record is cached for the path with a
    /// fresh one built from current file content. Returns the files that
    /// could not be loaded.
    pub fn on_file_changed(&mut self, path: &Path, action: ChangeAction) -> Vec<LoadFailure> {
        let mut failures = Vec::new();

        if self.source.is_dir(path) {
            match self.source.list_files(path, true) {
                Ok(listing) => {
                    failures.extend(
                        listing
                            .unreadable
                            .into_iter()
                            .map(|(path, error)| LoadFailure { path, error }),
                    );
                    for file in listing.files {
                        self.apply_file_change(&file, action, &mut failures);
                    }
                }
                Err(error) => failures.push(LoadFailure {
                    path: path.to_path_buf(),
                    error,
                }),
            }
            // Files may have vanished alongside the directory entries
            if action == ChangeAction::Delete {
                self.evict_under(path);
            }
        } else {
            self.apply_file_change(path, action, &mut failures);
        }

        failures
    }

    fn apply_file_change(&mut self, path: &Path, action: ChangeAction, failures: &mut Vec<LoadFailure>) {
        if action == ChangeAction::Delete {
            // The path may have been a directory; nothing is left to ask
            self.evict_under(path);
            return;
        }

        if !self.is_record_path(path) {
            debug!("Ignoring {} event for {}", action, path.display());
            return;
        }

        let on_duplicate = match action {
            ChangeAction::Create => OnDuplicate::Reject,
            ChangeAction::Modify | ChangeAction::Rename => OnDuplicate::Supersede,
            ChangeAction::Delete => return,
        };

        debug!("Applying {} for {}", action, path.display());
        self.evict_path(path);
        if let Err(error) = self.load_file(path, on_duplicate) {
            warn!("Failed to load record after {}: {}", action, error);
            failures.push(LoadFailure {
                path: path.to_path_buf(),
                error,
            });
        }
    }

    /// Create a new record with a fresh identifier, write it, and cache it.
    ///
    /// The path must be a record file under the records directory and must
    /// not exist yet.
    pub fn create_record(
        &mut self,
        type_name: &str,
        path: impl Into<PathBuf>,
        props: Map<String, Value>,
    ) -> Result<ObjectId> {
        let path = path.into();
        let schema = self
            .schemas
            .get_shared(type_name)
            .ok_or_else(|| StoreError::UnknownType(type_name.to_string()))?;
        if !self.is_record_path(&path) {
            return Err(StoreError::NotARecordPath(path));
        }
        if self.find_by_path(&path).is_some() || self.source.exists(&path) {
            return Err(StoreError::PathOccupied(path));
        }

        let mut record = Record::new(schema, ObjectId::new_v4(), path);
        *record.props_mut() = props;
        record.save(self.source.as_ref())?;

        let id = record.id();
        self.records.insert(id, record);
        info!("Created {} record {}", type_name, id);
        Ok(id)
    }

    /// Write a cached record to its file
    pub fn save_record(&self, id: ObjectId) -> Result<()> {
        let record = self
            .records
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.save(self.source.as_ref())
    }

    /// Delete a record's file and drop it from the cache
    pub fn delete_record(&mut self, id: ObjectId) -> Result<()> {
        let record = self
            .records
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.delete(self.source.as_ref())?;
        self.records.remove(&id);
        Ok(())
    }

    /// Rename a record's file; the cached record follows it.
    ///
    /// Refuses a target that is not a record path or that already exists on
    /// disk, whether or not a live record owns it.
    pub fn move_record(&mut self, id: ObjectId, new_path: impl Into<PathBuf>) -> Result<()> {
        let new_path = new_path.into();
        let current = self
            .records
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .path()
            .to_path_buf();
        if new_path == current {
            return Ok(());
        }
        if !self.is_record_path(&new_path) {
            return Err(StoreError::NotARecordPath(new_path));
        }
        if self.find_by_path(&new_path).is_some() || self.source.exists(&new_path) {
            return Err(StoreError::PathOccupied(new_path));
        }

        let source = self.source.as_ref();
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.move_to(source, new_path)
    }

    fn is_record_path(&self, path: &Path) -> bool {
        path.starts_with(&self.layout.records_dir)
            && !path.starts_with(&self.layout.schema_dir)
            && has_extension(path, &self.layout.extension)
    }

    fn load_file(&mut self, path: &Path, on_duplicate: OnDuplicate) -> Result<ObjectId> {
        let raw = self.source.read(path)?;
        let record = Record::from_document(path, &raw, &self.schemas)?;
        let id = record.id();

        if let Some(owner) = self.records.get(&id) {
            // Only a record whose file is gone can be taken over
            let owner_live = self.source.exists(owner.path());
            if on_duplicate == OnDuplicate::Reject || owner_live {
                return Err(StoreError::DuplicateObjectId {
                    path: path.to_path_buf(),
                    id: id.to_string(),
                    owner: owner.path().to_path_buf(),
                });
            }
            debug!(
                "Record {} moved from {} to {}",
                id,
                owner.path().display(),
                path.display()
            );
        }

        self.records.insert(id, record);
        Ok(id)
    }

    fn evict_path(&mut self, path: &Path) -> Option<Record> {
        let id = self.records.values().find(|r| r.path() == path)?.id();
        self.records.remove(&id)
    }

    fn evict_under(&mut self, path: &Path) {
        let before = self.records.len();
        self.records.retain(|_, r| !r.path().starts_with(path));
        let evicted = before - self.records.len();
        if evicted > 0 {
            debug!("Evicted {} record(s) under {}", evicted, path.display());
        }
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("layout", &self.layout)
            .field("schemas", &self.schemas.names())
            .field("records", &self.records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FsSource, Listing};
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    const ADA: &str = "11111111-1111-4111-8111-111111111111";
    const BOB: &str = "22222222-2222-4222-8222-222222222222";

    fn vault() -> (TempDir, RecordStore) {
        let dir = tempdir().unwrap();
        let source = FsSource::new(dir.path());
        source
            .upsert(
                Path::new("schemas/note.json"),
                r#"{"type":"Note","objectId":"","title":"","parent":""}"#,
            )
            .unwrap();
        let store = RecordStore::new(Arc::new(source), StoreLayout::default());
        (dir, store)
    }

    fn write(store: &RecordStore, path: &str, doc: Value) {
        store.source().upsert(Path::new(path), &doc.to_string()).unwrap();
    }

    #[test]
    fn test_record_path_filter() {
        let (_dir, store) = vault();
        assert!(store.is_record_path(Path::new("records/a.json")));
        assert!(store.is_record_path(Path::new("records/deep/a.JSON")));
        assert!(!store.is_record_path(Path::new("records/a.md")));
        assert!(!store.is_record_path(Path::new("notes/a.json")));
    }

    #[test]
    fn test_schema_dir_inside_records_root_is_skipped() {
        let dir = tempdir().unwrap();
        let source = FsSource::new(dir.path());
        source
            .upsert(Path::new("_schemas/note.json"), r#"{"type":"Note","objectId":""}"#)
            .unwrap();
        let layout = StoreLayout {
            schema_dir: PathBuf::from("_schemas"),
            records_dir: PathBuf::new(),
            extension: "json".to_string(),
        };
        let mut store = RecordStore::new(Arc::new(source), layout);
        write(&store, "a.json", json!({ "type": "Note", "objectId": ADA }));

        let report = store.build_cache().unwrap();
        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(report.loaded, 1);
    }

    #[test]
    fn test_duplicate_id_on_build_keeps_first() {
        let (_dir, mut store) = vault();
        write(&store, "records/a.json", json!({ "type": "Note", "objectId": ADA, "title": "A" }));
        write(&store, "records/b.json", json!({ "type": "Note", "objectId": ADA, "title": "B" }));

        let report = store.build_cache().unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, StoreError::DuplicateObjectId { .. }));
        assert_eq!(store.get_record(ADA).unwrap().path(), Path::new("records/a.json"));
    }

    #[test]
    fn test_rename_supersedes_old_path() {
        let (_dir, mut store) = vault();
        write(&store, "records/a.json", json!({ "type": "Note", "objectId": ADA }));
        store.build_cache().unwrap();

        store
            .source()
            .rename(Path::new("records/a.json"), Path::new("records/b.json"))
            .unwrap();
        let failures = store.on_file_changed(Path::new("records/b.json"), ChangeAction::Rename);
        assert!(failures.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_record(ADA).unwrap().path(), Path::new("records/b.json"));

        // The trailing delete for the old name finds nothing to remove
        store.on_file_changed(Path::new("records/a.json"), ChangeAction::Delete);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_record_and_path_occupied() {
        let (_dir, mut store) = vault();
        store.build_cache().unwrap();

        let mut props = Map::new();
        props.insert("title".to_string(), json!("Fresh"));
        let id = store.create_record("Note", "records/fresh.json", props).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.get("title").unwrap().as_str(), Some("Fresh"));
        assert!(store.source().exists(Path::new("records/fresh.json")));

        let err = store
            .create_record("Note", "records/fresh.json", Map::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::PathOccupied(_)));

        let err = store.create_record("Robot", "records/r.json", Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownType(_)));
    }

    #[test]
    fn test_move_record_refreshes_path() {
        let (_dir, mut store) = vault();
        write(&store, "records/a.json", json!({ "type": "Note", "objectId": ADA }));
        store.build_cache().unwrap();
        let id = ObjectId::parse(ADA).unwrap();

        store.move_record(id, "records/archive/a.json").unwrap();
        assert_eq!(store.get(id).unwrap().path(), Path::new("records/archive/a.json"));

        store.record_mut(id).unwrap().set("title", "Moved");
        store.save_record(id).unwrap();
        assert!(!store.source().exists(Path::new("records/a.json")));
        let raw = store.source().read(Path::new("records/archive/a.json")).unwrap();
        assert!(raw.contains("Moved"));

        store.delete_record(id).unwrap();
        assert!(store.get(id).is_none());
        assert!(!store.source().exists(Path::new("records/archive/a.json")));
    }

    #[test]
    fn test_missing_id_operations() {
        let (_dir, mut store) = vault();
        store.build_cache().unwrap();
        let id = ObjectId::new_v4();
        assert!(matches!(store.save_record(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_record(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.move_record(id, "records/x.json"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_events_outside_records_root_are_ignored() {
        let (_dir, mut store) = vault();
        store.build_cache().unwrap();
        write(&store, "elsewhere/a.json", json!({ "type": "Note", "objectId": ADA }));

        let failures = store.on_file_changed(Path::new("elsewhere/a.json"), ChangeAction::Create);
        assert!(failures.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_modify_reusing_live_id_is_rejected() {
        let (_dir, mut store) = vault();
        write(&store, "records/a.json", json!({ "type": "Note", "objectId": ADA, "title": "A" }));
        write(&store, "records/b.json", json!({ "type": "Note", "objectId": BOB, "title": "B" }));
        store.build_cache().unwrap();

        write(&store, "records/b.json", json!({ "type": "Note", "objectId": ADA, "title": "copy" }));
        let failures = store.on_file_changed(Path::new("records/b.json"), ChangeAction::Modify);

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, StoreError::DuplicateObjectId { .. }));
        assert_eq!(store.len(), 1);
        let ada = store.get_record(ADA).unwrap();
        assert_eq!(ada.path(), Path::new("records/a.json"));
        assert_eq!(ada.get("title").unwrap().as_str(), Some("A"));
    }

    #[test]
    fn test_move_record_refuses_existing_file() {
        let (_dir, mut store) = vault();
        write(&store, "records/a.json", json!({ "type": "Note", "objectId": ADA }));
        store.source().upsert(Path::new("records/b.json"), "{ user data").unwrap();
        let report = store.build_cache().unwrap();
        assert_eq!(report.failures.len(), 1);
        let id = ObjectId::parse(ADA).unwrap();

        let err = store.move_record(id, "records/b.json").unwrap_err();
        assert!(matches!(err, StoreError::PathOccupied(_)));
        assert_eq!(store.source().read(Path::new("records/b.json")).unwrap(), "{ user data");
        assert_eq!(store.get(id).unwrap().path(), Path::new("records/a.json"));

        // Moving onto its own path is a no-op
        store.move_record(id, "records/a.json").unwrap();
        assert!(store.source().exists(Path::new("records/a.json")));
    }

    #[test]
    fn test_paths_outside_records_are_refused() {
        let (_dir, mut store) = vault();
        write(&store, "records/a.json", json!({ "type": "Note", "objectId": ADA }));
        store.build_cache().unwrap();

        let err = store.create_record("Note", "notes/x.json", Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::NotARecordPath(_)));
        let err = store.create_record("Note", "records/x.md", Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::NotARecordPath(_)));
        assert!(!store.source().exists(Path::new("notes/x.json")));

        let id = ObjectId::parse(ADA).unwrap();
        let err = store.move_record(id, "notes/a.json").unwrap_err();
        assert!(matches!(err, StoreError::NotARecordPath(_)));
        assert!(store.source().exists(Path::new("records/a.json")));
    }

    /// Reports one directory as unreadable on every listing that covers it
    struct LockedDir {
        inner: FsSource,
        locked: PathBuf,
    }

    impl FileSource for LockedDir {
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn is_dir(&self, path: &Path) -> bool {
            self.inner.is_dir(path)
        }

        fn list_files(&self, dir: &Path, recursive: bool) -> Result<Listing> {
            let mut listing = self.inner.list_files(dir, recursive)?;
            if self.locked.starts_with(dir) {
                let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
                listing.unreadable.push((self.locked.clone(), StoreError::Io(denied)));
            }
            Ok(listing)
        }

        fn read(&self, path: &Path) -> Result<String> {
            self.inner.read(path)
        }

        fn upsert(&self, path: &Path, contents: &str) -> Result<()> {
            self.inner.upsert(path, contents)
        }

        fn rename(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.rename(from, to)
        }

        fn remove(&self, path: &Path) -> Result<()> {
            self.inner.remove(path)
        }
    }

    #[test]
    fn test_unreadable_entries_are_reported() {
        let dir = tempdir().unwrap();
        let inner = FsSource::new(dir.path());
        inner
            .upsert(Path::new("schemas/note.json"), r#"{"type":"Note","objectId":""}"#)
            .unwrap();
        inner
            .upsert(Path::new("records/a.json"), &json!({ "type": "Note", "objectId": ADA }).to_string())
            .unwrap();
        let source = LockedDir {
            inner,
            locked: PathBuf::from("records/locked"),
        };
        let mut store = RecordStore::new(Arc::new(source), StoreLayout::default());

        let report = store.build_cache().unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, Path::new("records/locked"));

        let failures = store.on_file_changed(Path::new("records"), ChangeAction::Modify);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, Path::new("records/locked"));
        assert_eq!(store.len(), 1);
    }
}
