//! Schema migrations for the collection store.
//!
//! # Responsibility
//! - Register schema steps, each tagged with the `user_version` it produces.
//! - Bring a database up to the latest version in one transaction.
//!
//! # Invariants
//! - Steps are listed in strictly increasing version order, starting at 1.
//! - Steps are additive: they create tables, never drop or rewrite them.
//! - `PRAGMA user_version` equals the version of the last applied step.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "collections",
        sql: include_str!("0001_collections.sql"),
    },
    SchemaStep {
        version: 2,
        name: "local_values",
        sql: include_str!("0002_local_values.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Steps still missing from a database at `current`.
///
/// Refuses databases written by a newer binary.
fn pending_steps(current: u32) -> DbResult<&'static [SchemaStep]> {
    let latest = latest_version();
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    let applied = SCHEMA_STEPS.partition_point(|step| step.version <= current);
    Ok(&SCHEMA_STEPS[applied..])
}

/// Upgrades the schema behind `conn` to [`latest_version`].
///
/// A database already at the latest version is left alone.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the database is newer than
///   this binary. Nothing is modified in that case.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let steps = pending_steps(from_version)?;
    let Some(last) = steps.last() else {
        return Ok(());
    };

    let tx = conn.transaction()?;
    for step in steps {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=applied version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from_version,
        last.version,
        steps.len()
    );
    Ok(())
}

/// Reads the schema version persisted in `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
