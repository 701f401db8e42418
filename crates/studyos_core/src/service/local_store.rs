//! Local store facade.
//!
//! # Responsibility
//! - Own the lazily opened database handle shared by every feature.
//! - Provide typed CRUD per collection, the scalar side-channel, and
//!   whole-store export/import.
//!
//! # Invariants
//! - The database is opened at most once per store; concurrent first calls
//!   wait for the same open instead of racing schema setup.
//! - A failed open is not cached; the next call tries again.
//! - Every mutation is its own SQLite transaction. Import is a single
//!   transaction covering all collections.
//! - Errors are always returned to the caller, never retried or dropped.

use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::collection::{Collection, UnknownCollectionError};
use crate::model::record::record_id;
use crate::repo::local_value_repo::{LocalValueRepository, SqliteLocalValueRepository};
use crate::repo::record_repo::{RecordRepository, RepoError, SqliteRecordRepository};
use crate::service::backup::{BackupSnapshot, ImportPolicy, ImportReport};
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure taxonomy surfaced to store callers.
#[derive(Debug)]
pub enum StoreError {
    /// The database could not be opened or bootstrapped.
    StoreUnavailable(DbError),
    /// A collection name outside the fixed registry.
    UnknownCollection(String),
    /// `add` (or a fail-fast import) hit an id that already exists.
    DuplicateKey { collection: Collection, id: String },
    /// Backup text is not a JSON object of record arrays.
    InvalidBackup(String),
    /// A record is not an object with a string `id`, or does not fit the
    /// caller's type.
    InvalidRecord(String),
    /// Persisted data could not be decoded.
    InvalidData(String),
    /// Driver failure while the database was open.
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable(err) => write!(f, "local store unavailable: {err}"),
            Self::UnknownCollection(name) => write!(f, "unknown collection `{name}`"),
            Self::DuplicateKey { collection, id } => {
                write!(f, "record `{id}` already exists in `{collection}`")
            }
            Self::InvalidBackup(message) => write!(f, "invalid backup: {message}"),
            Self::InvalidRecord(message) => write!(f, "invalid record: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) | Self::Db(err) => Some(err),
            Self::UnknownCollection(_)
            | Self::DuplicateKey { .. }
            | Self::InvalidBackup(_)
            | Self::InvalidRecord(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            RepoError::Duplicate { collection, id } => Self::DuplicateKey { collection, id },
            RepoError::InvalidRecord(err) => Self::InvalidRecord(err.to_string()),
            RepoError::InvalidData(message) => Self::InvalidData(message),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<UnknownCollectionError> for StoreError {
    fn from(value: UnknownCollectionError) -> Self {
        Self::UnknownCollection(value.0)
    }
}

#[derive(Debug, Clone)]
enum DbLocation {
    File(PathBuf),
    Memory,
}

/// Handle to the on-device record store.
///
/// Construct one per application and share it (`Arc<LocalStore>`) with the
/// features that persist data. Nothing touches disk until the first call.
pub struct LocalStore {
    location: DbLocation,
    conn: OnceCell<Mutex<Connection>>,
}

impl LocalStore {
    /// Store backed by a database file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_location(DbLocation::File(path.into()))
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self::with_location(DbLocation::Memory)
    }

    /// Store backed by the database file named in `config`.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::open(config.db_path.clone())
    }

    fn with_location(location: DbLocation) -> Self {
        Self {
            location,
            conn: OnceCell::new(),
        }
    }

    /// Database file path, or `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        match &self.location {
            DbLocation::File(path) => Some(path.as_path()),
            DbLocation::Memory => None,
        }
    }

    /// Whether the database handle has been opened yet.
    pub fn is_initialized(&self) -> bool {
        self.conn.get().is_some()
    }

    /// Opens the database and applies schema migrations if not done yet.
    ///
    /// Safe to call repeatedly and from several threads at once.
    ///
    /// # Errors
    /// - `StoreUnavailable` when the database cannot be opened.
    pub fn init(&self) -> StoreResult<()> {
        self.handle().map(|_| ())
    }

    /// Returns every record of `collection`, ordered by id.
    pub fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<Vec<T>> {
        let records =
            self.with_conn(|conn| Ok(SqliteRecordRepository::new(conn).list_records(collection)?))?;
        records
            .into_iter()
            .map(|record| decode_record(collection, record))
            .collect()
    }

    /// Point lookup by id. `Ok(None)` means not found.
    pub fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> StoreResult<Option<T>> {
        let record = self
            .with_conn(|conn| Ok(SqliteRecordRepository::new(conn).get_record(collection, id)?))?;
        record
            .map(|record| decode_record(collection, record))
            .transpose()
    }

    /// Inserts a new record.
    ///
    /// # Errors
    /// - `DuplicateKey` when a record with the same id exists. The stored
    ///   record is left untouched.
    /// - `InvalidRecord` when the record has no string `id`.
    pub fn add<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        record: &T,
    ) -> StoreResult<()> {
        let record = encode_record(record)?;
        self.with_conn(|conn| {
            SqliteRecordRepository::new(conn).insert_record(collection, &record)?;
            Ok(())
        })?;
        debug!("event=record_add module=store status=ok collection={collection}");
        Ok(())
    }

    /// Inserts the record, or fully replaces the one with the same id.
    pub fn update<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        record: &T,
    ) -> StoreResult<()> {
        let record = encode_record(record)?;
        self.with_conn(|conn| {
            SqliteRecordRepository::new(conn).upsert_record(collection, &record)?;
            Ok(())
        })?;
        debug!("event=record_update module=store status=ok collection={collection}");
        Ok(())
    }

    /// Removes the record with `id`. Missing ids are not an error.
    pub fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            SqliteRecordRepository::new(conn).delete_record(collection, id)?;
            Ok(())
        })?;
        debug!("event=record_delete module=store status=ok collection={collection}");
        Ok(())
    }

    /// Removes every record of `collection`.
    pub fn clear(&self, collection: Collection) -> StoreResult<()> {
        let removed = self.with_conn(|conn| {
            Ok(SqliteRecordRepository::new(conn).clear_records(collection)?)
        })?;
        info!(
            "event=collection_clear module=store status=ok collection={} removed={}",
            collection, removed
        );
        Ok(())
    }

    /// Number of records in `collection`.
    pub fn count(&self, collection: Collection) -> StoreResult<usize> {
        self.with_conn(|conn| Ok(SqliteRecordRepository::new(conn).count_records(collection)?))
    }

    /// Stores a small JSON value under `key`, overwriting any previous one.
    pub fn set_local<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> StoreResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|err| StoreError::InvalidRecord(format!("cannot encode local value: {err}")))?;
        self.with_conn(|conn| Ok(SqliteLocalValueRepository::new(conn).set_value(key, &json)?))
    }

    /// Reads the value stored under `key`. `Ok(None)` when absent.
    pub fn get_local<V: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<V>> {
        let json =
            self.with_conn(|conn| Ok(SqliteLocalValueRepository::new(conn).get_value(key)?))?;
        json.map(|json| {
            serde_json::from_str(&json).map_err(|err| {
                StoreError::InvalidData(format!("local value `{key}` is not decodable: {err}"))
            })
        })
        .transpose()
    }

    /// Removes the value stored under `key`, if any.
    pub fn remove_local(&self, key: &str) -> StoreResult<()> {
        self.with_conn(|conn| Ok(SqliteLocalValueRepository::new(conn).remove_value(key)?))
    }

    /// Reads every collection into a snapshot.
    ///
    /// Collections are read one after another; a write landing between two
    /// reads may or may not be included.
    pub fn export_snapshot(&self) -> StoreResult<BackupSnapshot> {
        let started_at = Instant::now();
        let mut snapshot = BackupSnapshot::default();
        for collection in Collection::ALL {
            let records = self.with_conn(|conn| {
                Ok(SqliteRecordRepository::new(conn).list_records(collection)?)
            })?;
            snapshot.insert(collection, records);
        }
        info!(
            "event=store_export module=store status=ok records={} duration_ms={}",
            snapshot.record_count(),
            started_at.elapsed().as_millis()
        );
        Ok(snapshot)
    }

    /// Serializes every collection into one pretty-printed JSON document.
    pub fn export_all(&self) -> StoreResult<String> {
        self.export_snapshot()?.to_json()
    }

    /// Restores a backup document with the default `ImportPolicy`.
    pub fn import_all(&self, backup: &str) -> StoreResult<ImportReport> {
        self.import_with_policy(backup, ImportPolicy::default())
    }

    /// Restores a backup document.
    ///
    /// The document is fully validated before the first write, then applied
    /// in one transaction. With `ImportPolicy::FailFast` the first id
    /// collision aborts and nothing from the backup is kept.
    ///
    /// # Errors
    /// - `InvalidBackup` for malformed documents or records.
    /// - `UnknownCollection` for keys outside the registry.
    /// - `DuplicateKey` under `ImportPolicy::FailFast`.
    pub fn import_with_policy(
        &self,
        backup: &str,
        policy: ImportPolicy,
    ) -> StoreResult<ImportReport> {
        let started_at = Instant::now();
        let snapshot = BackupSnapshot::parse(backup)?;

        let report = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let report = apply_snapshot(&SqliteRecordRepository::new(&tx), &snapshot, policy)?;
            tx.commit()?;
            Ok(report)
        });

        match &report {
            Ok(report) => {
                for skipped in &report.skipped {
                    warn!(
                        "event=store_import module=store status=skipped collection={} reason=duplicate_id",
                        skipped.collection
                    );
                }
                info!(
                    "event=store_import module=store status=ok policy={} inserted={} replaced={} skipped={} duration_ms={}",
                    policy,
                    report.total_inserted(),
                    report.total_replaced(),
                    report.skipped.len(),
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => warn!(
                "event=store_import module=store status=error policy={} duration_ms={} error={}",
                policy,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        report
    }

    fn handle(&self) -> StoreResult<&Mutex<Connection>> {
        self.conn.get_or_try_init(|| {
            let conn = match &self.location {
                DbLocation::File(path) => open_db(path),
                DbLocation::Memory => open_db_in_memory(),
            }
            .map_err(StoreError::StoreUnavailable)?;
            info!("event=store_init module=store status=ok");
            Ok(Mutex::new(conn))
        })
    }

    fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<R>) -> StoreResult<R> {
        let handle = self.handle()?;
        // Critical sections are single statements or transactions; a
        // poisoned lock still guards a consistent connection.
        let mut conn = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn)
    }
}

fn apply_snapshot(
    repo: &impl RecordRepository,
    snapshot: &BackupSnapshot,
    policy: ImportPolicy,
) -> StoreResult<ImportReport> {
    let mut report = ImportReport::default();

    for (collection, records) in snapshot.iter() {
        for record in records {
            match policy {
                ImportPolicy::FailFast => {
                    repo.insert_record(collection, record)?;
                    report.note_inserted(collection);
                }
                ImportPolicy::SkipExisting => match repo.insert_record(collection, record) {
                    Ok(()) => report.note_inserted(collection),
                    Err(RepoError::Duplicate { collection, id }) => {
                        report.note_skipped(collection, id)
                    }
                    Err(err) => return Err(err.into()),
                },
                ImportPolicy::Overwrite => {
                    let id = record_id(record).map_err(RepoError::from)?;
                    let existed = repo.contains_record(collection, id)?;
                    repo.upsert_record(collection, record)?;
                    if existed {
                        report.note_replaced(collection);
                    } else {
                        report.note_inserted(collection);
                    }
                }
            }
        }
    }

    Ok(report)
}

fn encode_record<T: Serialize + ?Sized>(record: &T) -> StoreResult<Value> {
    serde_json::to_value(record)
        .map_err(|err| StoreError::InvalidRecord(format!("cannot encode record: {err}")))
}

fn decode_record<T: DeserializeOwned>(collection: Collection, record: Value) -> StoreResult<T> {
    let id = record_id(&record).unwrap_or("<unknown>").to_string();
    serde_json::from_value(record).map_err(|err| {
        StoreError::InvalidRecord(format!(
            "record `{id}` in `{collection}` does not match the requested type: {err}"
        ))
    })
}
