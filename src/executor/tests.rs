//! Unit tests for the command executor: retries, ranking, prompt
//! rendering, and idempotent persistence.

use super::*;
use crate::collaborators::testing::{
    FlakyEmbedder, MemoryRepository, ScriptedModel, StaticEmbedder, StaticSearcher,
};
use crate::domain::{CourseId, Part, Section, TimestampUtc};
use crate::state_machine::LlmTask;
use std::collections::BTreeMap;

fn fast_retry_config() -> GenerationConfig {
    GenerationConfig {
        retry: crate::config::RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        ..GenerationConfig::default()
    }
}

fn test_state() -> CourseGenerationState {
    let mut state = CourseGenerationState::new(CourseId::new(), TimestampUtc::now(), 3600);
    state.query = "Learn DCF valuation".to_string();
    state.target_duration_minutes = 120;
    state
}

fn executor_with(
    embedder: Arc<dyn Embedder>,
    searcher: Arc<dyn SourceSearcher>,
    model: Arc<dyn LanguageModel>,
    repository: Arc<dyn CourseRepository>,
) -> CommandExecutor {
    CommandExecutor::new(embedder, searcher, model, repository, fast_retry_config())
}

fn default_executor() -> CommandExecutor {
    executor_with(
        Arc::new(StaticEmbedder::unit()),
        Arc::new(StaticSearcher { hits: vec![] }),
        Arc::new(ScriptedModel::new(vec![])),
        Arc::new(MemoryRepository::new()),
    )
}

fn hit(id: &str, similarity: f32, version: i64) -> SourceHit {
    SourceHit {
        source_id: id.to_string(),
        title: id.to_string(),
        summary: String::new(),
        similarity,
        version,
    }
}

#[tokio::test]
async fn embed_returns_vector_payload() {
    let executor = default_executor();
    let outcome = executor
        .execute(
            &Command::EmbedText {
                text: "hello".to_string(),
            },
            &test_state(),
        )
        .await;

    match outcome {
        ExecutionOutcome::Success(ExecutionPayload::Vector(v)) => assert_eq!(v.len(), 3),
        other => panic!("expected vector payload, got {:?}", other),
    }
}

#[tokio::test]
async fn retryable_failure_is_retried_to_success() {
    let executor = executor_with(
        Arc::new(FlakyEmbedder::new(2, true)),
        Arc::new(StaticSearcher { hits: vec![] }),
        Arc::new(ScriptedModel::new(vec![])),
        Arc::new(MemoryRepository::new()),
    );

    let outcome = executor
        .execute(
            &Command::EmbedText {
                text: "hello".to_string(),
            },
            &test_state(),
        )
        .await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Success(ExecutionPayload::Vector(_))
    ));
}

#[tokio::test]
async fn non_retryable_failure_stops_immediately() {
    let executor = executor_with(
        Arc::new(FlakyEmbedder::new(1, false)),
        Arc::new(StaticSearcher { hits: vec![] }),
        Arc::new(ScriptedModel::new(vec![])),
        Arc::new(MemoryRepository::new()),
    );

    let outcome = executor
        .execute(
            &Command::EmbedText {
                text: "hello".to_string(),
            },
            &test_state(),
        )
        .await;

    match outcome {
        ExecutionOutcome::Failure { message } => {
            assert!(message.contains("after 1 attempt"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn retries_exhaust_into_failure() {
    let executor = executor_with(
        Arc::new(FlakyEmbedder::new(10, true)),
        Arc::new(StaticSearcher { hits: vec![] }),
        Arc::new(ScriptedModel::new(vec![])),
        Arc::new(MemoryRepository::new()),
    );

    let outcome = executor
        .execute(
            &Command::EmbedText {
                text: "hello".to_string(),
            },
            &test_state(),
        )
        .await;

    match outcome {
        ExecutionOutcome::Failure { message } => {
            assert!(message.contains("after 3 attempt"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn search_results_are_ranked_filtered_and_truncated() {
    let executor = executor_with(
        Arc::new(StaticEmbedder::unit()),
        Arc::new(StaticSearcher {
            hits: vec![
                hit("low", 0.1, 9),
                hit("older", 0.8, 1),
                hit("newer", 0.8, 5),
                hit("best", 0.95, 1),
                hit("ok", 0.5, 1),
            ],
        }),
        Arc::new(ScriptedModel::new(vec![])),
        Arc::new(MemoryRepository::new()),
    );

    let outcome = executor
        .execute(
            &Command::SearchSources {
                vector: vec![1.0],
                top_k: 3,
                min_similarity: 0.2,
            },
            &test_state(),
        )
        .await;

    match outcome {
        ExecutionOutcome::Success(ExecutionPayload::Sources(hits)) => {
            let ids: Vec<&str> = hits.iter().map(|h| h.source_id.as_str()).collect();
            // "low" filtered out, similarity descending, version breaks
            // the 0.8 tie, truncated to top 3.
            assert_eq!(ids, vec!["best", "newer", "older"]);
        }
        other => panic!("expected sources payload, got {:?}", other),
    }
}

#[tokio::test]
async fn invoke_llm_renders_the_named_template() {
    let model = Arc::new(ScriptedModel::new(vec![Ok("Part 1: X — 30 minutes".to_string())]));
    let executor = executor_with(
        Arc::new(StaticEmbedder::unit()),
        Arc::new(StaticSearcher { hits: vec![] }),
        model.clone(),
        Arc::new(MemoryRepository::new()),
    );

    let mut vars = BTreeMap::new();
    vars.insert("query".to_string(), "Learn DCF valuation".to_string());
    let outcome = executor
        .execute(
            &Command::InvokeLlm {
                task: LlmTask::GenerateParts,
                prompt_vars: vars,
                temperature: 0.7,
                max_tokens: 100,
            },
            &test_state(),
        )
        .await;

    assert!(matches!(
        outcome,
        ExecutionOutcome::Success(ExecutionPayload::Text(_))
    ));
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Learn DCF valuation"));
    assert!(prompts[0].contains("Part 1:"));
}

#[tokio::test]
async fn persist_course_is_idempotent() {
    let repository = Arc::new(MemoryRepository::new());
    let executor = executor_with(
        Arc::new(StaticEmbedder::unit()),
        Arc::new(StaticSearcher { hits: vec![] }),
        Arc::new(ScriptedModel::new(vec![])),
        repository.clone(),
    );
    let state = test_state();

    for _ in 0..2 {
        let outcome = executor.execute(&Command::PersistCourse, &state).await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::Success(ExecutionPayload::Persisted)
        ));
    }

    assert_eq!(repository.course_upsert_count(), 2);
    assert_eq!(repository.stored_course_count(), 1);
}

#[tokio::test]
async fn persist_sections_flattens_parts_into_rows() {
    let repository = Arc::new(MemoryRepository::new());
    let executor = executor_with(
        Arc::new(StaticEmbedder::unit()),
        Arc::new(StaticSearcher { hits: vec![] }),
        Arc::new(ScriptedModel::new(vec![])),
        repository.clone(),
    );

    let mut state = test_state();
    state.parts_list = vec![Part {
        index: 0,
        title: "Foundations".to_string(),
        target_minutes: 60,
        sections: vec![
            Section {
                title: "Basics".to_string(),
                learning_objectives: vec!["Understand discounting".to_string()],
                estimated_minutes: 30,
                content_summary: "Intro".to_string(),
            },
            Section {
                title: "Practice".to_string(),
                learning_objectives: vec![],
                estimated_minutes: 30,
                content_summary: String::new(),
            },
        ],
    }];

    let outcome = executor.execute(&Command::PersistCourse, &state).await;
    assert!(matches!(outcome, ExecutionOutcome::Success(_)));
    let outcome = executor.execute(&Command::PersistSections, &state).await;
    assert!(matches!(outcome, ExecutionOutcome::Success(_)));

    let stored = repository
        .fetch_course(&state.course_id)
        .await
        .expect("fetch")
        .expect("course present");
    assert_eq!(stored.1.len(), 2);
    assert_eq!(stored.1[0].part_title, "Foundations");
    assert_eq!(stored.1[0].section_index, 0);
    assert_eq!(stored.1[1].title, "Practice");
}
