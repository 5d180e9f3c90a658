//! In-memory state store for tests.

use crate::domain::{CourseId, TimestampUtc};
use crate::state::CourseGenerationState;
use crate::state_store::{StateStore, StateStoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// HashMap-backed store with the same version/TTL semantics as the
/// file store.
#[derive(Default)]
pub struct InMemoryStateStore {
    records: Mutex<HashMap<CourseId, CourseGenerationState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates a stored record directly, bypassing the version check.
    /// Simulates an out-of-band writer (e.g. a cancel request from
    /// another process).
    pub fn mutate<F>(&self, course_id: &CourseId, f: F)
    where
        F: FnOnce(&mut CourseGenerationState),
    {
        let mut records = self.records.lock().expect("records lock");
        if let Some(state) = records.get_mut(course_id) {
            f(state);
            state.version += 1;
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseGenerationState>, StateStoreError> {
        let mut records = self.records.lock().expect("records lock");
        let expired = records
            .get(course_id)
            .map(|s| s.is_expired(TimestampUtc::now()))
            .unwrap_or(false);
        if expired {
            records.remove(course_id);
            return Ok(None);
        }
        Ok(records.get(course_id).cloned())
    }

    async fn put(&self, state: &mut CourseGenerationState) -> Result<(), StateStoreError> {
        let mut records = self.records.lock().expect("records lock");
        let stored_version = records
            .get(&state.course_id)
            .map(|s| s.version)
            .unwrap_or(0);
        if stored_version != state.version {
            return Err(StateStoreError::VersionConflict {
                expected: state.version,
                actual: stored_version,
            });
        }
        state.version += 1;
        records.insert(state.course_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, course_id: &CourseId) -> Result<(), StateStoreError> {
        self.records
            .lock()
            .expect("records lock")
            .remove(course_id);
        Ok(())
    }
}
