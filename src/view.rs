//! Reference-resolving views
//!
//! Property reads go through these views. Any string that has the shape of
//! a version-4 UUID is looked up in the store on every access and handed
//! back as the live record (or nothing, if that record is gone). The stored
//! string itself is never exposed through a view. Nested maps and lists are
//! wrapped the same way, so resolution works at any depth.
//!
//! Views borrow the store, so they cannot outlive a cache mutation.

use std::fmt;
use std::ops::Deref;

use serde_json::{Map, Value};

use crate::object_id::ObjectId;
use crate::record::Record;
use crate::store::RecordStore;

/// A live record together with the store that resolves its references
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
    store: &'a RecordStore,
    record: &'a Record,
}

impl<'a> RecordRef<'a> {
    pub(crate) fn new(store: &'a RecordStore, record: &'a Record) -> Self {
        Self { store, record }
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    /// Reference-resolving view over the top-level properties
    pub fn props(&self) -> MapView<'a> {
        MapView {
            store: self.store,
            map: self.record.props(),
        }
    }

    /// Shorthand for `props().get(key)`
    pub fn get(&self, key: &str) -> Option<Prop<'a>> {
        self.props().get(key)
    }
}

impl Deref for RecordRef<'_> {
    type Target = Record;

    fn deref(&self) -> &Record {
        self.record
    }
}

impl fmt::Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRef")
            .field("type", &self.record.type_name())
            .field("objectId", &self.record.id())
            .field("path", &self.record.path())
            .finish()
    }
}

/// A resolved property value
#[derive(Debug, Clone, Copy)]
pub enum Prop<'a> {
    /// An identifier that names a live record
    Record(RecordRef<'a>),
    /// Null, bool, number, or a plain string
    Scalar(&'a Value),
    List(ListView<'a>),
    Map(MapView<'a>),
}

impl<'a> Prop<'a> {
    /// Nested lookup. Works through maps and through resolved records.
    pub fn get(&self, key: &str) -> Option<Prop<'a>> {
        match self {
            Prop::Record(record) => record.get(key),
            Prop::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Element lookup in a list
    pub fn at(&self, index: usize) -> Option<Prop<'a>> {
        match self {
            Prop::List(list) => list.get(index),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<RecordRef<'a>> {
        match self {
            Prop::Record(record) => Some(*record),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&'a Value> {
        match self {
            Prop::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.as_scalar().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Value::as_bool)
    }

    pub fn as_list(&self) -> Option<ListView<'a>> {
        match self {
            Prop::List(list) => Some(*list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<MapView<'a>> {
        match self {
            Prop::Map(map) => Some(*map),
            _ => None,
        }
    }
}

/// Reference-resolving view over a JSON object
#[derive(Clone, Copy)]
pub struct MapView<'a> {
    store: &'a RecordStore,
    map: &'a Map<String, Value>,
}

impl<'a> MapView<'a> {
    pub fn get(&self, key: &str) -> Option<Prop<'a>> {
        self.map.get(key).and_then(|v| resolve(self.store, v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        let map = self.map;
        map.keys().map(String::as_str)
    }

    /// Entries with values resolved; dangling references yield `None`
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, Option<Prop<'a>>)> + 'a {
        let (store, map) = (self.store, self.map);
        map.iter().map(move |(k, v)| (k.as_str(), resolve(store, v)))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for MapView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Reference-resolving view over a JSON array
#[derive(Clone, Copy)]
pub struct ListView<'a> {
    store: &'a RecordStore,
    items: &'a [Value],
}

impl<'a> ListView<'a> {
    pub fn get(&self, index: usize) -> Option<Prop<'a>> {
        self.items.get(index).and_then(|v| resolve(self.store, v))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Prop<'a>>> + 'a {
        let (store, items) = (self.store, self.items);
        items.iter().map(move |v| resolve(store, v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for ListView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Wrap one stored value. Identifier-shaped strings become a live lookup.
fn resolve<'a>(store: &'a RecordStore, value: &'a Value) -> Option<Prop<'a>> {
    match value {
        Value::String(s) => match ObjectId::parse(s) {
            Some(id) => store.get(id).map(Prop::Record),
            None => Some(Prop::Scalar(value)),
        },
        Value::Array(items) => Some(Prop::List(ListView { store, items })),
        Value::Object(map) => Some(Prop::Map(MapView { store, map })),
        _ => Some(Prop::Scalar(value)),
    }
}
