//! Command executor: performs one side-effecting command against a
//! collaborator and returns a tagged outcome.
//!
//! The executor never panics and never returns `Err`: collaborator
//! failures are captured into `ExecutionOutcome::Failure` after the
//! bounded retry loop is exhausted. Retryable failures (timeouts,
//! transient faults) back off exponentially with jitter.

use crate::collaborators::{
    CollaboratorError, CourseRecord, CourseRepository, Embedder, LanguageModel, SectionRecord,
    SourceSearcher,
};
use crate::config::GenerationConfig;
use crate::domain::SourceHit;
use crate::outline::parser;
use crate::prompts;
use crate::state::CourseGenerationState;
use crate::state_machine::Command;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Successful result of one command.
#[derive(Debug, Clone)]
pub enum ExecutionPayload {
    Vector(Vec<f32>),
    Sources(Vec<SourceHit>),
    Text(String),
    Persisted,
}

/// Tagged outcome of executing one command.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success(ExecutionPayload),
    Failure { message: String },
}

/// Executes commands against the injected collaborators.
pub struct CommandExecutor {
    embedder: Arc<dyn Embedder>,
    searcher: Arc<dyn SourceSearcher>,
    model: Arc<dyn LanguageModel>,
    repository: Arc<dyn CourseRepository>,
    config: GenerationConfig,
}

impl CommandExecutor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        searcher: Arc<dyn SourceSearcher>,
        model: Arc<dyn LanguageModel>,
        repository: Arc<dyn CourseRepository>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            embedder,
            searcher,
            model,
            repository,
            config,
        }
    }

    /// Executes one command. Persistence payloads are derived from the
    /// state record, which keeps the commands themselves small and the
    /// upserts idempotent.
    pub async fn execute(
        &self,
        command: &Command,
        state: &CourseGenerationState,
    ) -> ExecutionOutcome {
        let result = match command {
            Command::EmbedText { text } => self
                .call_with_retries("embed", || {
                    let embedder = self.embedder.clone();
                    let text = text.clone();
                    async move { embedder.embed(&text).await }
                })
                .await
                .map(ExecutionPayload::Vector),

            Command::SearchSources {
                vector,
                top_k,
                min_similarity,
            } => self
                .call_with_retries("search", || {
                    let searcher = self.searcher.clone();
                    let vector = vector.clone();
                    let top_k = *top_k;
                    let min_similarity = *min_similarity;
                    async move { searcher.search(&vector, top_k, min_similarity).await }
                })
                .await
                .map(|hits| {
                    ExecutionPayload::Sources(rank_hits(hits, *top_k, *min_similarity))
                }),

            Command::InvokeLlm {
                task,
                prompt_vars,
                temperature,
                max_tokens,
            } => {
                let prompt = prompts::render_prompt(*task, prompt_vars);
                self.call_with_retries(task.as_str(), || {
                    let model = self.model.clone();
                    let prompt = prompt.clone();
                    let temperature = *temperature;
                    let max_tokens = *max_tokens;
                    async move { model.complete(&prompt, temperature, max_tokens).await }
                })
                .await
                .map(ExecutionPayload::Text)
            }

            Command::PersistCourse => {
                let record = course_record(state);
                self.call_with_retries("persist_course", || {
                    let repository = self.repository.clone();
                    let record = record.clone();
                    async move { repository.upsert_course(&record).await }
                })
                .await
                .map(|_| ExecutionPayload::Persisted)
            }

            Command::PersistSections => {
                let records = section_records(state);
                let course_id = state.course_id.clone();
                self.call_with_retries("persist_sections", || {
                    let repository = self.repository.clone();
                    let course_id = course_id.clone();
                    let records = records.clone();
                    async move { repository.upsert_sections(&course_id, &records).await }
                })
                .await
                .map(|_| ExecutionPayload::Persisted)
            }
        };

        match result {
            Ok(payload) => ExecutionOutcome::Success(payload),
            Err(e) => ExecutionOutcome::Failure { message: e.message },
        }
    }

    /// Runs one collaborator call under the configured timeout,
    /// retrying retryable failures with exponential backoff + jitter.
    async fn call_with_retries<T, F, Fut>(
        &self,
        what: &str,
        call: F,
    ) -> Result<T, CollaboratorError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let timeout = Duration::from_secs(self.config.collaborator_timeout_secs);
        let max_attempts = self.config.retry.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let error = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => CollaboratorError::timeout(what),
            };

            if !error.retryable || attempt >= max_attempts {
                return Err(CollaboratorError {
                    message: format!("{} failed after {} attempt(s): {}", what, attempt, error),
                    retryable: false,
                });
            }

            let delay = self.backoff_delay(attempt);
            tracing::warn!(
                call = what,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "collaborator call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.retry.base_delay_ms.max(1);
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
        let capped = exp.min(self.config.retry.max_delay_ms.max(base));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(capped + jitter)
    }
}

/// Enforces the search contract regardless of collaborator behavior:
/// descending similarity, ties broken by most recent source version,
/// filtered and truncated.
fn rank_hits(mut hits: Vec<SourceHit>, top_k: usize, min_similarity: f32) -> Vec<SourceHit> {
    hits.retain(|h| h.similarity >= min_similarity);
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.version.cmp(&a.version))
    });
    hits.truncate(top_k);
    hits
}

/// Builds the durable course row from the state record.
fn course_record(state: &CourseGenerationState) -> CourseRecord {
    CourseRecord {
        course_id: state.course_id.clone(),
        title: state.query.clone(),
        query: state.query.clone(),
        target_duration_minutes: state.target_duration_minutes,
        total_estimated_minutes: parser::parse_outline_total_time(&state.outline_text),
        outline_text: state.outline_text.clone(),
        created_at: state.created_at,
    }
}

/// Flattens parts into section rows keyed by (course, part, section).
fn section_records(state: &CourseGenerationState) -> Vec<SectionRecord> {
    let mut records = Vec::new();
    for part in &state.parts_list {
        for (section_index, section) in part.sections.iter().enumerate() {
            records.push(SectionRecord {
                course_id: state.course_id.clone(),
                part_index: part.index,
                part_title: part.title.clone(),
                section_index,
                title: section.title.clone(),
                learning_objectives: section.learning_objectives.clone(),
                estimated_minutes: section.estimated_minutes,
                content_summary: section.content_summary.clone(),
            });
        }
    }
    records
}

#[cfg(test)]
mod tests;
