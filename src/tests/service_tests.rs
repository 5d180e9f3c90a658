//! Tests for the start/poll/retrieve/cancel surface.

use crate::collaborators::testing::MemoryRepository;
use crate::collaborators::{CourseRecord, CourseRepository};
use crate::config::GenerationConfig;
use crate::domain::{CourseId, GenerationError, Preferences, TimestampUtc};
use crate::service::{CourseService, StartRequest};
use crate::state::CourseStatus;
use crate::state_machine::Command;
use crate::state_store::memory::InMemoryStateStore;
use crate::state_store::StateStore;
use std::sync::Arc;

fn request(query: &str, hours: f64) -> StartRequest {
    StartRequest {
        query: query.to_string(),
        target_duration_hours: hours,
        preferences: Preferences::default(),
    }
}

fn service_with(
    store: Arc<InMemoryStateStore>,
    repository: Arc<MemoryRepository>,
) -> CourseService {
    CourseService::new(store, repository, GenerationConfig::default())
}

fn service() -> (CourseService, Arc<InMemoryStateStore>, Arc<MemoryRepository>) {
    let store = Arc::new(InMemoryStateStore::new());
    let repository = Arc::new(MemoryRepository::new());
    (
        service_with(store.clone(), repository.clone()),
        store,
        repository,
    )
}

#[tokio::test]
async fn start_rejects_empty_query_before_creating_state() {
    let (service, store, _) = service();

    let result = service.start(request("   ", 2.0)).await;

    assert!(matches!(result, Err(GenerationError::Validation { .. })));
    // No record was created for the rejected request.
    let any_id = CourseId::new();
    assert!(store.get(&any_id).await.expect("get").is_none());
}

#[tokio::test]
async fn start_rejects_non_positive_duration() {
    let (service, _, _) = service();

    for hours in [0.0, -1.0, f64::NAN] {
        let result = service.start(request("Learn DCF valuation", hours)).await;
        assert!(matches!(result, Err(GenerationError::Validation { .. })));
    }
}

#[tokio::test]
async fn start_persists_record_with_embed_command_queued() {
    let (service, store, _) = service();

    let response = service
        .start(request("Learn DCF valuation", 2.0))
        .await
        .expect("start");
    assert_eq!(response.status, "processing");

    let state = store
        .get(&response.course_id)
        .await
        .expect("get")
        .expect("record");
    assert_eq!(state.status, CourseStatus::Embedding);
    assert_eq!(state.target_duration_minutes, 120);
    assert_eq!(state.query, "Learn DCF valuation");
    assert!(matches!(
        state.pending_commands[..],
        [Command::EmbedText { .. }]
    ));
}

#[tokio::test]
async fn poll_reports_processing_phase_and_progress() {
    let (service, _, _) = service();
    let response = service
        .start(request("Learn DCF valuation", 2.0))
        .await
        .expect("start");

    let poll = service.poll(&response.course_id).await.expect("poll");

    assert_eq!(poll.status, "processing");
    assert_eq!(poll.phase, "embedding");
    assert!(poll.progress > 0.0 && poll.progress < 1.0);
    assert!(poll.error.is_none());
}

#[tokio::test]
async fn poll_unknown_course_is_a_validation_error() {
    let (service, _, _) = service();
    let result = service.poll(&CourseId::new()).await;
    assert!(matches!(result, Err(GenerationError::Validation { .. })));
}

#[tokio::test]
async fn poll_falls_back_to_stored_course_after_state_expiry() {
    let (service, _, repository) = service();
    let course_id = CourseId::new();
    repository
        .upsert_course(&CourseRecord {
            course_id: course_id.clone(),
            title: "Learn DCF valuation".to_string(),
            query: "Learn DCF valuation".to_string(),
            target_duration_minutes: 120,
            total_estimated_minutes: 120,
            outline_text: String::new(),
            created_at: TimestampUtc::now(),
        })
        .await
        .expect("upsert");

    let poll = service.poll(&course_id).await.expect("poll");

    assert_eq!(poll.status, "complete");
    assert!((poll.progress - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn retrieve_returns_the_stored_bundle() {
    let (service, _, repository) = service();
    let course_id = CourseId::new();
    repository
        .upsert_course(&CourseRecord {
            course_id: course_id.clone(),
            title: "Learn DCF valuation".to_string(),
            query: "Learn DCF valuation".to_string(),
            target_duration_minutes: 120,
            total_estimated_minutes: 118,
            outline_text: "Part 1: ...".to_string(),
            created_at: TimestampUtc::now(),
        })
        .await
        .expect("upsert");

    let bundle = service.retrieve(&course_id).await.expect("retrieve");

    assert_eq!(bundle.course.total_estimated_minutes, 118);
    assert!(bundle.sections.is_empty());
}

#[tokio::test]
async fn cancel_sets_the_out_of_band_flag() {
    let (service, store, _) = service();
    let response = service
        .start(request("Learn DCF valuation", 2.0))
        .await
        .expect("start");

    service.cancel(&response.course_id).await.expect("cancel");

    let state = store
        .get(&response.course_id)
        .await
        .expect("get")
        .expect("record");
    assert!(state.cancel_requested);
}
