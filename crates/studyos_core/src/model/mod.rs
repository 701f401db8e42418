//! Storage-facing data model.
//!
//! # Responsibility
//! - Define the closed collection registry.
//! - Define the opaque record contract shared by every collection.
//!
//! # Invariants
//! - Records are identified by a string `id`, unique per collection.
//! - Entity attributes are never interpreted by the store.

pub mod collection;
pub mod record;
