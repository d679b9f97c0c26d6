//! Identifier resolution, exact-match queries and field updates.
//!
//! These types are shared by every backend so that the document store and the
//! in-memory fallback agree on what a query matches and what an update changes.

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use std::fmt;

/// Field holding the record identifier.
pub const ID_FIELD: &str = "_id";

/// A flag identifier in one of its two representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlagId {
    /// Identifier assigned by the document store (24 hex characters).
    Native(ObjectId),
    /// Identifier assigned by the in-memory fallback, or any other opaque string.
    Raw(String),
}

impl FlagId {
    /// Classify a caller-supplied identifier.
    ///
    /// Anything that parses as an `ObjectId` is native, everything else is raw.
    pub fn resolve(id: &str) -> Self {
        match ObjectId::parse_str(id) {
            Ok(oid) => FlagId::Native(oid),
            Err(_) => FlagId::Raw(id.to_string()),
        }
    }

    /// Generate a fresh fallback identifier.
    pub fn generate() -> Self {
        FlagId::Raw(uuid::Uuid::new_v4().to_string())
    }

    /// Read an identifier back out of a stored `_id` value.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::ObjectId(oid) => Some(FlagId::Native(*oid)),
            Bson::String(s) => Some(FlagId::Raw(s.clone())),
            _ => None,
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            FlagId::Native(oid) => Bson::ObjectId(*oid),
            FlagId::Raw(s) => Bson::String(s.clone()),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, FlagId::Native(_))
    }
}

impl fmt::Display for FlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagId::Native(oid) => write!(f, "{}", oid.to_hex()),
            FlagId::Raw(s) => write!(f, "{}", s),
        }
    }
}

/// Exact-match query: every field must equal the given value.
///
/// Keys may be dotted paths into sub-documents (`environments.production`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query(Document);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query matching a single identifier.
    pub fn by_id(id: &FlagId) -> Self {
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id.to_bson());
        Self(filter)
    }

    /// Add an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, record: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| lookup(record, field) == Some(expected))
    }

    /// Filter document as understood by the document store.
    pub fn as_document(&self) -> &Document {
        &self.0
    }
}

/// Field replacements applied to a single record.
///
/// Each entry replaces exactly one field. Dotted paths replace a single leaf
/// inside a sub-document and leave its siblings untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates(Document);

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    /// Update document as understood by the document store.
    pub fn to_update_document(&self) -> Document {
        doc! { "$set": self.0.clone() }
    }

    /// Apply the replacements in place. Returns whether the record changed.
    pub fn apply(&self, record: &mut Document) -> bool {
        let mut modified = false;
        for (path, value) in self.0.iter() {
            modified |= set_path(record, path, value.clone());
        }
        modified
    }
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(record: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}

/// Set a dotted path, creating intermediate sub-documents.
/// Returns whether the stored value changed.
fn set_path(record: &mut Document, path: &str, value: Bson) -> bool {
    match path.split_once('.') {
        None => {
            if record.get(path) == Some(&value) {
                return false;
            }
            record.insert(path, value);
            true
        }
        Some((head, rest)) => {
            let entry = record
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            if !matches!(entry, Bson::Document(_)) {
                *entry = Bson::Document(Document::new());
            }
            match entry {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => false,
            }
        }
    }
}
