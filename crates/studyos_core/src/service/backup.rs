//! Backup document model and import policy.
//!
//! # Responsibility
//! - Parse and validate backup documents before anything is written.
//! - Render snapshots as the on-disk backup format.
//! - Describe how id collisions are handled on restore.
//!
//! # Invariants
//! - The backup format is one JSON object: collection name -> record array.
//! - Every array element is an object with a non-empty string `id`.
//! - Non-array values are ignored whatever their key. Array values under an
//!   unknown collection name are rejected.
//! - Rendered documents list collections in registry order.

use crate::model::collection::Collection;
use crate::model::record::record_id;
use crate::service::local_store::{StoreError, StoreResult};
use log::warn;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Records of each collection, keyed in registry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupSnapshot {
    collections: BTreeMap<Collection, Vec<Value>>,
}

impl BackupSnapshot {
    /// Parses a backup document.
    ///
    /// # Errors
    /// - `InvalidBackup` when the text is not JSON, not an object, or holds
    ///   a record without a usable `id`.
    /// - `UnknownCollection` for keys outside the registry.
    pub fn parse(text: &str) -> StoreResult<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|err| StoreError::InvalidBackup(format!("not a JSON document: {err}")))?;
        let Value::Object(entries) = document else {
            return Err(StoreError::InvalidBackup(
                "top-level value must be an object of collections".to_string(),
            ));
        };

        let mut snapshot = Self::default();
        for (name, value) in entries {
            let Value::Array(records) = value else {
                warn!("event=backup_parse module=backup status=skipped reason=not_an_array");
                continue;
            };
            let collection = Collection::from_name(&name)?;

            for (index, record) in records.iter().enumerate() {
                record_id(record).map_err(|err| {
                    StoreError::InvalidBackup(format!("{name}[{index}]: {err}"))
                })?;
            }
            snapshot.insert(collection, records);
        }

        Ok(snapshot)
    }

    /// Sets the records of one collection, replacing earlier ones.
    pub fn insert(&mut self, collection: Collection, records: Vec<Value>) {
        self.collections.insert(collection, records);
    }

    /// Records of `collection`, if the snapshot carries it.
    pub fn records(&self, collection: Collection) -> Option<&[Value]> {
        self.collections.get(&collection).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Collection, &[Value])> {
        self.collections
            .iter()
            .map(|(collection, records)| (*collection, records.as_slice()))
    }

    /// Total number of records across collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Renders the snapshot as a pretty-printed JSON document, with
    /// collections in registry order.
    pub fn to_json(&self) -> StoreResult<String> {
        let document: Map<String, Value> = self
            .collections
            .iter()
            .map(|(collection, records)| {
                (collection.name().to_string(), Value::Array(records.clone()))
            })
            .collect();
        serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|err| StoreError::InvalidData(format!("cannot render backup: {err}")))
    }
}

/// How restore treats records whose id already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Keep the stored record, report the backup one as skipped.
    #[default]
    SkipExisting,
    /// Replace stored records with the backup ones.
    Overwrite,
    /// Abort on the first collision and keep nothing from the backup.
    FailFast,
}

impl ImportPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkipExisting => "skip",
            Self::Overwrite => "overwrite",
            Self::FailFast => "fail-fast",
        }
    }
}

impl Display for ImportPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" | "skip-existing" => Ok(Self::SkipExisting),
            "overwrite" => Ok(Self::Overwrite),
            "fail-fast" | "strict" => Ok(Self::FailFast),
            other => Err(format!(
                "unsupported import policy `{other}`; expected skip|overwrite|fail-fast"
            )),
        }
    }
}

/// Backup record left untouched because its id was already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub collection: Collection,
    pub id: String,
}

/// Outcome of one restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: BTreeMap<Collection, usize>,
    pub replaced: BTreeMap<Collection, usize>,
    pub skipped: Vec<SkippedRecord>,
}

impl ImportReport {
    pub fn total_inserted(&self) -> usize {
        self.inserted.values().sum()
    }

    pub fn total_replaced(&self) -> usize {
        self.replaced.values().sum()
    }

    /// True when every backup record was written.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub(crate) fn note_inserted(&mut self, collection: Collection) {
        *self.inserted.entry(collection).or_default() += 1;
    }

    pub(crate) fn note_replaced(&mut self, collection: Collection) {
        *self.replaced.entry(collection).or_default() += 1;
    }

    pub(crate) fn note_skipped(&mut self, collection: Collection, id: String) {
        self.skipped.push(SkippedRecord { collection, id });
    }
}

#[cfg(test)]
mod tests {
    use super::{BackupSnapshot, ImportPolicy};
    use crate::model::collection::Collection;
    use crate::service::local_store::StoreError;
    use serde_json::{json, Value};

    #[test]
    fn parse_rejects_non_json_and_non_objects() {
        assert!(matches!(
            BackupSnapshot::parse("{not json"),
            Err(StoreError::InvalidBackup(_))
        ));
        assert!(matches!(
            BackupSnapshot::parse("[1, 2, 3]"),
            Err(StoreError::InvalidBackup(_))
        ));
    }

    #[test]
    fn parse_rejects_unknown_collections() {
        let err = BackupSnapshot::parse(r#"{"projects": []}"#).unwrap_err();
        assert!(matches!(err, StoreError::UnknownCollection(name) if name == "projects"));
    }

    #[test]
    fn parse_skips_non_array_values() {
        let snapshot =
            BackupSnapshot::parse(r#"{"tasks": {"id": "t1"}, "notes": [{"id": "n1"}]}"#).unwrap();
        assert!(snapshot.records(Collection::Tasks).is_none());
        assert_eq!(snapshot.records(Collection::Notes).map(<[Value]>::len), Some(1));
    }

    #[test]
    fn parse_ignores_unknown_keys_without_arrays() {
        let snapshot =
            BackupSnapshot::parse(r#"{"exportedAt": "2024-01-01", "goals": [{"id": "g1"}]}"#)
                .unwrap();
        assert_eq!(snapshot.record_count(), 1);
    }

    #[test]
    fn parse_points_at_the_bad_record() {
        let err =
            BackupSnapshot::parse(r#"{"goals": [{"id": "g1"}, {"title": "no id"}]}"#).unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidBackup(message) if message.starts_with("goals[1]"))
        );
    }

    #[test]
    fn to_json_uses_collection_names_as_keys() {
        let mut snapshot = BackupSnapshot::default();
        snapshot.insert(Collection::StudySessions, vec![json!({"id": "s1", "minutes": 25})]);
        snapshot.insert(Collection::Tasks, Vec::new());

        let rendered: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(
            rendered,
            json!({"studySessions": [{"id": "s1", "minutes": 25}], "tasks": []})
        );
    }

    #[test]
    fn policy_parses_cli_spellings() {
        assert_eq!("skip".parse(), Ok(ImportPolicy::SkipExisting));
        assert_eq!("Overwrite".parse(), Ok(ImportPolicy::Overwrite));
        assert_eq!("fail-fast".parse(), Ok(ImportPolicy::FailFast));
        assert!("merge".parse::<ImportPolicy>().is_err());
        assert_eq!(ImportPolicy::default(), ImportPolicy::SkipExisting);
    }
}
