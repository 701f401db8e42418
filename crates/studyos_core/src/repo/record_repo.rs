//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the per-collection record tables.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths check the record shape (`record_id`) before SQL mutations.
//! - Each call is one SQL statement, hence atomic on its own.
//! - Read paths reject undecodable persisted bodies instead of masking them.

use crate::db::DbError;
use crate::model::collection::Collection;
use crate::model::record::{record_id, RecordShapeError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Duplicate { collection: Collection, id: String },
    InvalidRecord(RecordShapeError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Duplicate { collection, id } => {
                write!(f, "record `{id}` already exists in `{collection}`")
            }
            Self::InvalidRecord(err) => write!(f, "invalid record: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidRecord(err) => Some(err),
            Self::Duplicate { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RecordShapeError> for RepoError {
    fn from(value: RecordShapeError) -> Self {
        Self::InvalidRecord(value)
    }
}

/// Repository interface for per-collection record storage.
pub trait RecordRepository {
    /// Returns every record of the collection, ordered by id.
    fn list_records(&self, collection: Collection) -> RepoResult<Vec<Value>>;
    fn get_record(&self, collection: Collection, id: &str) -> RepoResult<Option<Value>>;
    fn contains_record(&self, collection: Collection, id: &str) -> RepoResult<bool>;
    /// Inserts a new record; fails with `Duplicate` when the id is taken.
    fn insert_record(&self, collection: Collection, record: &Value) -> RepoResult<()>;
    /// Inserts or fully replaces the record with the same id.
    fn upsert_record(&self, collection: Collection, record: &Value) -> RepoResult<()>;
    /// Removes the record if present. Absent ids are not an error.
    fn delete_record(&self, collection: Collection, id: &str) -> RepoResult<()>;
    /// Removes every record and returns how many were removed.
    fn clear_records(&self, collection: Collection) -> RepoResult<usize>;
    fn count_records(&self, collection: Collection) -> RepoResult<usize>;
}

/// SQLite-backed record repository.
///
/// Accepts any `Connection`, including an open `Transaction` through deref,
/// so bulk paths reuse the same statements as single-record calls.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn list_records(&self, collection: Collection) -> RepoResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, body FROM {} ORDER BY id ASC;",
            collection.table()
        ))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            records.push(parse_body(collection, &id, &body)?);
        }

        Ok(records)
    }

    fn get_record(&self, collection: Collection, id: &str) -> RepoResult<Option<Value>> {
        let body = self
            .conn
            .query_row(
                &format!("SELECT body FROM {} WHERE id = ?1;", collection.table()),
                [id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(parse_body(collection, id, &body)?)),
            None => Ok(None),
        }
    }

    fn contains_record(&self, collection: Collection, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                collection.table()
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_record(&self, collection: Collection, record: &Value) -> RepoResult<()> {
        let id = record_id(record)?;
        let body = encode_body(record)?;

        let changed = self.conn.execute(
            &format!(
                "INSERT INTO {} (id, body) VALUES (?1, ?2)
                 ON CONFLICT(id) DO NOTHING;",
                collection.table()
            ),
            params![id, body],
        )?;

        if changed == 0 {
            return Err(RepoError::Duplicate {
                collection,
                id: id.to_string(),
            });
        }

        Ok(())
    }

    fn upsert_record(&self, collection: Collection, record: &Value) -> RepoResult<()> {
        let id = record_id(record)?;
        let body = encode_body(record)?;

        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, body) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body;",
                collection.table()
            ),
            params![id, body],
        )?;

        Ok(())
    }

    fn delete_record(&self, collection: Collection, id: &str) -> RepoResult<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", collection.table()),
            [id],
        )?;
        Ok(())
    }

    fn clear_records(&self, collection: Collection) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {};", collection.table()), [])?;
        Ok(removed)
    }

    fn count_records(&self, collection: Collection) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", collection.table()),
            [],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }
}

fn encode_body(record: &Value) -> RepoResult<String> {
    serde_json::to_string(record)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode record: {err}")))
}

fn parse_body(collection: Collection, id: &str, body: &str) -> RepoResult<Value> {
    serde_json::from_str(body).map_err(|err| {
        RepoError::InvalidData(format!(
            "undecodable body for `{id}` in {}.body: {err}",
            collection.table()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{RecordRepository, RepoError, SqliteRecordRepository};
    use crate::db::open_db_in_memory;
    use crate::model::collection::Collection;
    use crate::model::record::RecordShapeError;
    use serde_json::json;

    #[test]
    fn insert_rejects_records_without_string_id() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteRecordRepository::new(&conn);

        let err = repo
            .insert_record(Collection::Notes, &json!({"title": "no id"}))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::InvalidRecord(RecordShapeError::MissingId)
        ));
        assert_eq!(repo.count_records(Collection::Notes).unwrap(), 0);
    }

    #[test]
    fn collections_are_isolated_from_each_other() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteRecordRepository::new(&conn);

        repo.insert_record(Collection::Tasks, &json!({"id": "same", "kind": "task"}))
            .unwrap();
        repo.insert_record(Collection::Habits, &json!({"id": "same", "kind": "habit"}))
            .unwrap();

        let task = repo.get_record(Collection::Tasks, "same").unwrap().unwrap();
        let habit = repo.get_record(Collection::Habits, "same").unwrap().unwrap();
        assert_eq!(task["kind"], "task");
        assert_eq!(habit["kind"], "habit");
    }

    #[test]
    fn corrupted_body_is_reported_not_masked() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO goals (id, body) VALUES ('g1', 'not json');",
            [],
        )
        .unwrap();
        let repo = SqliteRecordRepository::new(&conn);

        let err = repo.get_record(Collection::Goals, "g1").unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(message) if message.contains("goals.body")));
    }

    #[test]
    fn clear_reports_removed_rows() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteRecordRepository::new(&conn);
        repo.insert_record(Collection::Files, &json!({"id": "f1"})).unwrap();
        repo.insert_record(Collection::Files, &json!({"id": "f2"})).unwrap();

        assert_eq!(repo.clear_records(Collection::Files).unwrap(), 2);
        assert_eq!(repo.clear_records(Collection::Files).unwrap(), 0);
    }
}
