//! Versioned, TTL-aware store for course generation state records.
//!
//! One keyed record per course. Writes are optimistic: the caller's
//! record carries the version it last read, a mismatch is rejected,
//! and the version increments on every successful write. Expired
//! records are treated as absent.

pub mod file_store;
#[cfg(test)]
pub mod memory;

pub use file_store::FileStateStore;

use crate::domain::CourseId;
use crate::state::CourseGenerationState;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};

/// Errors surfaced by a state store.
#[derive(Debug, Clone)]
pub enum StateStoreError {
    /// Optimistic lock failure: the stored version moved on.
    VersionConflict { expected: u64, actual: u64 },
    /// Underlying storage failure.
    Io { message: String },
    /// Stored record could not be decoded.
    Corrupt { message: String },
}

impl Display for StateStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionConflict { expected, actual } => write!(
                f,
                "version conflict: expected {}, stored {}",
                expected, actual
            ),
            Self::Io { message } => write!(f, "state store io failure: {}", message),
            Self::Corrupt { message } => write!(f, "corrupt state record: {}", message),
        }
    }
}

impl std::error::Error for StateStoreError {}

/// Keyed record store with optimistic concurrency and TTL expiry.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetches a record. Expired records are removed and reported as
    /// absent.
    async fn get(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseGenerationState>, StateStoreError>;

    /// Writes a record if `state.version` matches storage; on success
    /// the record's version is incremented in place.
    async fn put(&self, state: &mut CourseGenerationState) -> Result<(), StateStoreError>;

    /// Removes a record. Absent records are not an error.
    async fn delete(&self, course_id: &CourseId) -> Result<(), StateStoreError>;
}
