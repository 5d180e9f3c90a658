//! Collaborator interfaces consumed by the command executor.
//!
//! The core never talks to an embedding model, search index, LLM, or
//! relational store directly: it goes through these traits, injected at
//! construction. Implementations live in `local` (file- and
//! subprocess-backed) and in test doubles.

pub mod local;
#[cfg(test)]
pub mod testing;

use crate::domain::{CourseId, SourceHit, TimestampUtc};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A collaborator call failed. `retryable` drives the executor's
/// backoff loop: timeouts and transient faults retry, everything else
/// fails the phase immediately.
#[derive(Debug, Clone)]
pub struct CollaboratorError {
    pub message: String,
    pub retryable: bool,
}

impl CollaboratorError {
    /// A per-call timeout elapsed.
    pub fn timeout(what: &str) -> Self {
        Self {
            message: format!("{} timed out", what),
            retryable: true,
        }
    }

    /// The collaborator is unreachable or failed transiently.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// The collaborator answered, but the answer is unusable.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CollaboratorError {}

/// Text to fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;
}

/// Ranked similarity search over the source corpus.
#[async_trait]
pub trait SourceSearcher: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SourceHit>, CollaboratorError>;
}

/// Prompt in, completion out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CollaboratorError>;
}

/// The durable course record produced on successful storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub course_id: CourseId,
    pub title: String,
    pub query: String,
    pub target_duration_minutes: u32,
    pub total_estimated_minutes: u32,
    pub outline_text: String,
    pub created_at: TimestampUtc,
}

/// One stored section row, keyed by (course, part, section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub course_id: CourseId,
    pub part_index: usize,
    pub part_title: String,
    pub section_index: usize,
    pub title: String,
    pub learning_objectives: Vec<String>,
    pub estimated_minutes: u32,
    pub content_summary: String,
}

/// Relational-store boundary: idempotent upserts by primary key plus
/// fetch by course id.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), CollaboratorError>;

    async fn upsert_sections(
        &self,
        course_id: &CourseId,
        sections: &[SectionRecord],
    ) -> Result<(), CollaboratorError>;

    async fn fetch_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<(CourseRecord, Vec<SectionRecord>)>, CollaboratorError>;
}
