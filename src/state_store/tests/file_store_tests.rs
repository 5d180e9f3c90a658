//! File state store: versioning, TTL expiry, sweep.

use crate::domain::{CourseId, TimestampUtc};
use crate::state::CourseGenerationState;
use crate::state_store::{FileStateStore, StateStore, StateStoreError};
use tempfile::TempDir;

fn store() -> (FileStateStore, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    (FileStateStore::new(dir.path().to_path_buf()), dir)
}

fn fresh_state(ttl_seconds: i64) -> CourseGenerationState {
    let mut state =
        CourseGenerationState::new(CourseId::new(), TimestampUtc::now(), ttl_seconds);
    state.query = "Learn DCF valuation".to_string();
    state
}

#[tokio::test]
async fn put_then_get_roundtrips_and_bumps_version() {
    let (store, _dir) = store();
    let mut state = fresh_state(3600);

    store.put(&mut state).await.expect("put");
    assert_eq!(state.version, 1);

    let loaded = store
        .get(&state.course_id)
        .await
        .expect("get")
        .expect("record");
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.query, "Learn DCF valuation");
}

#[tokio::test]
async fn get_unknown_course_is_none() {
    let (store, _dir) = store();
    assert!(store.get(&CourseId::new()).await.expect("get").is_none());
}

#[tokio::test]
async fn stale_version_write_is_rejected() {
    let (store, _dir) = store();
    let mut state = fresh_state(3600);
    let mut stale = state.clone();

    store.put(&mut state).await.expect("first put");
    // `stale` still carries version 0 while storage is at 1.
    let result = store.put(&mut stale).await;

    match result {
        Err(StateStoreError::VersionConflict { expected, actual }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected version conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn sequential_writes_with_fresh_reads_succeed() {
    let (store, _dir) = store();
    let mut state = fresh_state(3600);
    store.put(&mut state).await.expect("put 1");

    let mut state = store
        .get(&state.course_id)
        .await
        .expect("get")
        .expect("record");
    state.review_iteration_count = 1;
    store.put(&mut state).await.expect("put 2");

    let loaded = store
        .get(&state.course_id)
        .await
        .expect("get")
        .expect("record");
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.review_iteration_count, 1);
}

#[tokio::test]
async fn expired_records_read_as_absent() {
    let (store, _dir) = store();
    let mut state = fresh_state(-10);

    store.put(&mut state).await.expect("put");

    assert!(store.get(&state.course_id).await.expect("get").is_none());
    // The expired file is gone, so a fresh record can be created.
    let mut again = CourseGenerationState::new(
        state.course_id.clone(),
        TimestampUtc::now(),
        3600,
    );
    store.put(&mut again).await.expect("recreate");
}

#[tokio::test]
async fn sweep_removes_only_expired_records() {
    let (store, _dir) = store();
    let mut live = fresh_state(3600);
    let mut dead = fresh_state(-10);
    store.put(&mut live).await.expect("put live");
    store.put(&mut dead).await.expect("put dead");

    let removed = store.sweep_expired(TimestampUtc::now()).expect("sweep");

    assert_eq!(removed, 1);
    assert!(store.get(&live.course_id).await.expect("get").is_some());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (store, _dir) = store();
    let mut state = fresh_state(3600);
    store.put(&mut state).await.expect("put");

    store.delete(&state.course_id).await.expect("delete");
    store.delete(&state.course_id).await.expect("delete again");

    assert!(store.get(&state.course_id).await.expect("get").is_none());
}
