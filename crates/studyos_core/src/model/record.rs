//! Opaque record helpers.
//!
//! # Responsibility
//! - Treat records as JSON attribute bags keyed by a string `id`.
//! - Generate fresh record ids for callers building new records.
//!
//! # Invariants
//! - A storable record is a JSON object whose `id` is a non-empty string.
//! - No other attribute is inspected here; entity validation belongs to the
//!   feature that owns the entity.

use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Record identifier; unique within one collection.
pub type RecordId = String;

/// Name of the key field every record carries.
pub const ID_FIELD: &str = "id";

/// Why a JSON value cannot be stored as a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordShapeError {
    NotAnObject,
    MissingId,
    NonStringId,
    EmptyId,
}

impl Display for RecordShapeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record must be a JSON object"),
            Self::MissingId => write!(f, "record has no `{ID_FIELD}` field"),
            Self::NonStringId => write!(f, "record `{ID_FIELD}` must be a string"),
            Self::EmptyId => write!(f, "record `{ID_FIELD}` must not be empty"),
        }
    }
}

impl Error for RecordShapeError {}

/// Returns a fresh unique record id (UUID v4, hyphenated).
pub fn new_record_id() -> RecordId {
    Uuid::new_v4().to_string()
}

/// Extracts the record id, checking the record shape on the way.
pub fn record_id(record: &Value) -> Result<&str, RecordShapeError> {
    let object = record.as_object().ok_or(RecordShapeError::NotAnObject)?;
    match object.get(ID_FIELD) {
        None => Err(RecordShapeError::MissingId),
        Some(Value::String(id)) if id.is_empty() => Err(RecordShapeError::EmptyId),
        Some(Value::String(id)) => Ok(id.as_str()),
        Some(_) => Err(RecordShapeError::NonStringId),
    }
}
