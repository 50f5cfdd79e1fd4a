//! Error types for the object store

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Object store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Schema {path} is missing the reserved `type`/`objectId` markers")]
    SchemaMissingMarkers { path: PathBuf },

    #[error("Schema {path} is not valid JSON: {source}")]
    SchemaMalformedSyntax {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {path} is missing the reserved `type`/`objectId` markers")]
    RecordMissingMarkers { path: PathBuf },

    #[error("Record {path} has unknown type: {type_name}")]
    RecordUnknownType { path: PathBuf, type_name: String },

    #[error("Record {path} is not valid JSON: {source}")]
    RecordMalformedSyntax {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {path} has an objectId that is not a version-4 UUID: {value}")]
    InvalidObjectId { path: PathBuf, value: String },

    #[error("Record {path} reuses objectId {id} already owned by {owner}")]
    DuplicateObjectId {
        path: PathBuf,
        id: String,
        owner: PathBuf,
    },

    #[error("Path already backs a live record: {0}")]
    PathOccupied(PathBuf),

    #[error("Not a record file under the records directory: {0}")]
    NotARecordPath(PathBuf),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl StoreError {
    /// Whether this error aborts a whole cache build rather than one file.
    pub fn is_fatal_to_build(&self) -> bool {
        matches!(self, StoreError::SchemaMissingMarkers { .. })
    }
}
