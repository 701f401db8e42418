//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for collection records and scalar values.
//! - Isolate SQLite query details from the store facade.
//!
//! # Invariants
//! - Record writes check the `id` shape before persistence.
//! - Repository APIs return semantic errors (`Duplicate`) in addition to DB
//!   transport errors.

pub mod local_value_repo;
pub mod record_repo;
