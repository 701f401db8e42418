//! Core use-case services.
//!
//! # Responsibility
//! - Expose the store facade features call into.
//! - Keep callers decoupled from SQL and repository details.

pub mod backup;
pub mod local_store;
