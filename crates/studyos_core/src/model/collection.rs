//! Collection registry.
//!
//! # Responsibility
//! - Name the fixed set of record collections the store manages.
//! - Map public collection names to their backing table names.
//!
//! # Invariants
//! - The registry is closed: unknown names are rejected, never created.
//! - `Collection::ALL` order, which is also the derived `Ord`, is the order
//!   collections appear in backups.
//! - Every variant has a table created by migration `0001_collections.sql`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One named record collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Tasks,
    Habits,
    StudySessions,
    StudyPlans,
    Notes,
    Files,
    Journal,
    Goals,
    Profile,
    Widgets,
    Challenges,
}

/// Raised when a caller names a collection outside the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCollectionError(pub String);

impl Display for UnknownCollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown collection `{}`", self.0)
    }
}

impl Error for UnknownCollectionError {}

impl Collection {
    /// Every registered collection, in registry order.
    pub const ALL: [Collection; 11] = [
        Collection::Tasks,
        Collection::Habits,
        Collection::StudySessions,
        Collection::StudyPlans,
        Collection::Notes,
        Collection::Files,
        Collection::Journal,
        Collection::Goals,
        Collection::Profile,
        Collection::Widgets,
        Collection::Challenges,
    ];

    /// Public collection name, as used in backups and by callers.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Habits => "habits",
            Self::StudySessions => "studySessions",
            Self::StudyPlans => "studyPlans",
            Self::Notes => "notes",
            Self::Files => "files",
            Self::Journal => "journal",
            Self::Goals => "goals",
            Self::Profile => "profile",
            Self::Widgets => "widgets",
            Self::Challenges => "challenges",
        }
    }

    /// SQLite table backing this collection.
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Habits => "habits",
            Self::StudySessions => "study_sessions",
            Self::StudyPlans => "study_plans",
            Self::Notes => "notes",
            Self::Files => "files",
            Self::Journal => "journal",
            Self::Goals => "goals",
            Self::Profile => "profile",
            Self::Widgets => "widgets",
            Self::Challenges => "challenges",
        }
    }

    /// Resolves a public collection name. Matching is exact.
    pub fn from_name(name: &str) -> Result<Self, UnknownCollectionError> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.name() == name)
            .ok_or_else(|| UnknownCollectionError(name.to_string()))
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = UnknownCollectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(value)
    }
}
