//! File-based state store implementation.
//!
//! One JSON record per course with:
//! - Optimistic concurrency via a version check inside a file lock
//! - Atomic writes via temp file + rename
//! - TTL expiry on read plus an explicit sweep

use crate::domain::{CourseId, TimestampUtc};
use crate::state::CourseGenerationState;
use crate::state_store::{StateStore, StateStoreError};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores each course's state as `<dir>/<course_id>.json`, guarded by
/// a sibling `.lock` file for cross-process exclusion.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, course_id: &CourseId) -> PathBuf {
        self.dir.join(format!("{}.json", course_id))
    }

    fn lock_path(&self, course_id: &CourseId) -> PathBuf {
        self.dir.join(format!("{}.lock", course_id))
    }

    /// Acquires the per-course exclusive lock. Released when the
    /// returned file handle drops.
    fn acquire_lock(&self, course_id: &CourseId) -> Result<File, StateStoreError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error)?;
        let lock = File::create(self.lock_path(course_id)).map_err(io_error)?;
        lock.lock_exclusive().map_err(io_error)?;
        Ok(lock)
    }

    /// Removes every expired record. Returns how many were removed.
    pub fn sweep_expired(&self, now: TimestampUtc) -> Result<usize, StateStoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_error(e)),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(state) = read_record(&path)? else {
                continue;
            };
            if state.is_expired(now) {
                std::fs::remove_file(&path).map_err(io_error)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseGenerationState>, StateStoreError> {
        let _lock = self.acquire_lock(course_id)?;
        let path = self.record_path(course_id);
        let Some(state) = read_record(&path)? else {
            return Ok(None);
        };
        if state.is_expired(TimestampUtc::now()) {
            std::fs::remove_file(&path).map_err(io_error)?;
            return Ok(None);
        }
        Ok(Some(state))
    }

    async fn put(&self, state: &mut CourseGenerationState) -> Result<(), StateStoreError> {
        let _lock = self.acquire_lock(&state.course_id)?;
        let path = self.record_path(&state.course_id);

        let stored_version = read_record(&path)?.map(|s| s.version).unwrap_or(0);
        if stored_version != state.version {
            return Err(StateStoreError::VersionConflict {
                expected: state.version,
                actual: stored_version,
            });
        }

        state.version += 1;
        let content = serde_json::to_string(state).map_err(|e| StateStoreError::Corrupt {
            message: e.to_string(),
        })?;

        // Write to temp file, then rename for atomicity.
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(io_error)?;
        std::fs::rename(&tmp_path, &path).map_err(io_error)?;
        Ok(())
    }

    async fn delete(&self, course_id: &CourseId) -> Result<(), StateStoreError> {
        let _lock = self.acquire_lock(course_id)?;
        match std::fs::remove_file(self.record_path(course_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

fn read_record(path: &Path) -> Result<Option<CourseGenerationState>, StateStoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StateStoreError::Corrupt {
            message: e.to_string(),
        })
}

fn io_error(e: std::io::Error) -> StateStoreError {
    StateStoreError::Io {
        message: e.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/file_store_tests.rs"]
mod tests;
