//! Vault Object Store
//!
//! The structured-data layer of a note vault: schema-gated JSON documents
//! kept in an in-memory cache that follows out-of-band file changes.
//!
//! ## Features
//!
//! - **Schema Gating**: Schemas decide which keys of a document are loaded and saved
//! - **Lazy References**: Identifier-valued properties resolve to live records on every read
//! - **Incremental Updates**: Create/modify/rename/delete events patch the cache in place
//! - **Isolated Failures**: A bad record file never stops its siblings from loading
//!
//! ## Layout
//!
//! ```text
//! vault/
//! ├── schemas/
//! │   ├── person.json      {"type": "Person", "objectId": "", "name": "", "friend": ""}
//! │   └── place.json
//! └── records/
//!     ├── people/
//!     │   ├── ada.json     {"type": "Person", "objectId": "1111…", "friend": "2222…"}
//!     │   └── bob.json
//!     └── places/
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vault_objects::{FsSource, RecordStore, StoreLayout};
//!
//! let mut store = RecordStore::new(Arc::new(FsSource::new("vault")), StoreLayout::default());
//! store.build_cache()?;
//!
//! if let Some(ada) = store.get_record("11111111-1111-4111-8111-111111111111") {
//!     let friend_name = ada.get("friend").and_then(|f| f.get("name"));
//!     println!("{:?}", friend_name.and_then(|n| n.as_str()));
//! }
//! # Ok::<(), vault_objects::StoreError>(())
//! ```

pub mod config;
pub mod error;
pub mod object_id;
pub mod record;
pub mod registry;
pub mod schema;
pub mod source;
pub mod store;
pub mod view;
pub mod watch;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use object_id::{is_object_id, ObjectId};
pub use record::Record;
pub use registry::SchemaRegistry;
pub use schema::Schema;
pub use source::{FileSource, FsSource, Listing};
pub use store::{BuildReport, ChangeAction, LoadFailure, RecordStore, StoreLayout};
pub use view::{ListView, MapView, Prop, RecordRef};
pub use watch::{FileChange, VaultWatcher, WatchOptions};
