//! Core data model types for the record source.
//!
//! A parsed row becomes a [`StructuredRecord`], which is wrapped in a [`Part`] (JSON bytes plus
//! the structured value) and handed to consumers as a single-part [`Message`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ReaderError, ReaderResult};

/// Ordered column names captured from the first record of a source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderSet {
    names: Vec<String>,
}

impl HeaderSet {
    /// Create a header set from column names.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Number of column names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no names were captured.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    /// Structure `fields` against these headers.
    ///
    /// Records wider than the header set stay positional; everything else is mapped by zipping
    /// header names with the record's fields.
    pub fn structure(&self, fields: Vec<String>) -> StructuredRecord {
        if self.names.is_empty() || self.names.len() < fields.len() {
            return StructuredRecord::Positional(fields);
        }
        let mut obj = Map::with_capacity(fields.len());
        for (name, value) in self.names.iter().zip(fields) {
            obj.insert(name.clone(), Value::String(value));
        }
        StructuredRecord::Mapped(obj)
    }
}

/// A single parsed row, either positional or keyed by header name.
///
/// The shape is decided per record, so a source read in header mode can yield both shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredRecord {
    /// Field values in column order.
    Positional(Vec<String>),
    /// Header name to field value, in header order.
    Mapped(Map<String, Value>),
}

impl StructuredRecord {
    /// Returns `true` for the mapped form.
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    /// Field count of this record.
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(v) => v.len(),
            Self::Mapped(m) => m.len(),
        }
    }

    /// Returns `true` if the record holds no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a field by header name (mapped form only).
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Self::Mapped(m) => m.get(name).and_then(Value::as_str),
            Self::Positional(_) => None,
        }
    }

    /// Convert into a `serde_json::Value` (array or object).
    pub fn to_json_value(&self) -> Value {
        match self {
            Self::Positional(v) => Value::Array(v.iter().cloned().map(Value::String).collect()),
            Self::Mapped(m) => Value::Object(m.clone()),
        }
    }
}

/// One entry of a [`Message`]: the JSON encoding of a record plus the record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    bytes: Vec<u8>,
    structured: StructuredRecord,
}

impl Part {
    /// Encode `structured` as JSON and wrap it.
    pub fn from_structured(structured: StructuredRecord) -> ReaderResult<Self> {
        let bytes = serde_json::to_vec(&structured).map_err(ReaderError::Encode)?;
        Ok(Self { bytes, structured })
    }

    /// Raw JSON bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The structured record.
    pub fn structured(&self) -> &StructuredRecord {
        &self.structured
    }
}

/// A batch of parts delivered by a single `read`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    parts: Vec<Part>,
}

impl Message {
    /// A message holding exactly one part.
    pub fn single(part: Part) -> Self {
        Self { parts: vec![part] }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

/// Outcome reported back through an [`AckFn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The message was processed downstream.
    Delivered,
    /// Downstream processing failed.
    Rejected(String),
}

/// Acknowledgment callback returned alongside every message.
///
/// Durability is left to a wrapping collaborator; the callbacks produced here always succeed.
pub type AckFn = Box<dyn FnOnce(AckOutcome) -> ReaderResult<()> + Send + 'static>;

pub(crate) fn noop_ack() -> AckFn {
    Box::new(|_| Ok(()))
}
