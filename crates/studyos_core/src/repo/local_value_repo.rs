//! Scalar key/value repository for small singleton settings.
//!
//! # Invariants
//! - Values are stored as JSON text; this layer never interprets them.
//! - Keys live in `local_values` only and never touch collection tables.
//! - Writes overwrite unconditionally; removal of a missing key is a no-op.

use crate::repo::record_repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for the scalar side-channel.
pub trait LocalValueRepository {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>>;
    fn set_value(&self, key: &str, json: &str) -> RepoResult<()>;
    fn remove_value(&self, key: &str) -> RepoResult<()>;
}

/// SQLite-backed scalar repository.
pub struct SqliteLocalValueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocalValueRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LocalValueRepository for SqliteLocalValueRepository<'_> {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_values WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_value(&self, key: &str, json: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO local_values (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, json],
        )?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM local_values WHERE key = ?1;", [key])?;
        Ok(())
    }
}
