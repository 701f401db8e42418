//! Local persistence core for the student productivity app.
//! Every feature (tasks, habits, study planner, journal, gamification)
//! reads and writes its records through [`LocalStore`].

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::StoreConfig;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::collection::{Collection, UnknownCollectionError};
pub use model::record::{new_record_id, record_id, RecordId, RecordShapeError};
pub use repo::record_repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use service::backup::{BackupSnapshot, ImportPolicy, ImportReport, SkippedRecord};
pub use service::local_store::{LocalStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
