//! Record identifiers
//!
//! Records are named by version-4 UUIDs in canonical hyphenated form. Any
//! property string with that exact shape is treated as a reference.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

fn v4_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("v4 pattern compiles")
    })
}

/// Whether `value` is syntactically a version-4 UUID.
pub fn is_object_id(value: &str) -> bool {
    v4_shape().is_match(value)
}

/// Identifier of a live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Mint a fresh random identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a string that has the version-4 shape; `None` otherwise.
    pub fn parse(value: &str) -> Option<Self> {
        if !is_object_id(value) {
            return None;
        }
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ObjectId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a version-4 UUID: {s}"))
    }
}

impl From<ObjectId> for serde_json::Value {
    fn from(id: ObjectId) -> Self {
        serde_json::Value::String(id.to_string())
    }
}
