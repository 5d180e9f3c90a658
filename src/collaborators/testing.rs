//! Test doubles for collaborator interfaces, shared by executor,
//! driver, and service tests.

use crate::collaborators::{
    CollaboratorError, CourseRecord, CourseRepository, Embedder, LanguageModel, SectionRecord,
    SourceSearcher,
};
use crate::domain::{CourseId, SourceHit};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Embedder returning a fixed vector.
pub struct StaticEmbedder {
    pub vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn unit() -> Self {
        Self {
            vector: vec![1.0, 0.0, 0.0],
        }
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
        Ok(self.vector.clone())
    }
}

/// Embedder that fails a configured number of times before succeeding.
pub struct FlakyEmbedder {
    remaining_failures: AtomicU32,
    pub retryable: bool,
}

impl FlakyEmbedder {
    pub fn new(failures: u32, retryable: bool) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            retryable,
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CollaboratorError {
                message: "embedder flaked".to_string(),
                retryable: self.retryable,
            });
        }
        Ok(vec![1.0, 0.0])
    }
}

/// Searcher returning a fixed hit list, ignoring the query vector.
pub struct StaticSearcher {
    pub hits: Vec<SourceHit>,
}

#[async_trait]
impl SourceSearcher for StaticSearcher {
    async fn search(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _min_similarity: f32,
    ) -> Result<Vec<SourceHit>, CollaboratorError> {
        Ok(self.hits.clone())
    }
}

/// Language model that replays a scripted response queue and records
/// every prompt it received.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, CollaboratorError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(CollaboratorError::invalid(
                    "scripted model ran out of responses",
                ))
            })
    }
}

/// In-memory course repository that counts upserts.
#[derive(Default)]
pub struct MemoryRepository {
    courses: Mutex<HashMap<CourseId, (CourseRecord, Vec<SectionRecord>)>>,
    course_upserts: AtomicU32,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn course_upsert_count(&self) -> u32 {
        self.course_upserts.load(Ordering::SeqCst)
    }

    pub fn stored_course_count(&self) -> usize {
        self.courses.lock().expect("courses lock").len()
    }
}

#[async_trait]
impl CourseRepository for MemoryRepository {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), CollaboratorError> {
        self.course_upserts.fetch_add(1, Ordering::SeqCst);
        let mut courses = self.courses.lock().expect("courses lock");
        let entry = courses
            .entry(course.course_id.clone())
            .or_insert_with(|| (course.clone(), Vec::new()));
        entry.0 = course.clone();
        Ok(())
    }

    async fn upsert_sections(
        &self,
        course_id: &CourseId,
        sections: &[SectionRecord],
    ) -> Result<(), CollaboratorError> {
        let mut courses = self.courses.lock().expect("courses lock");
        let Some(entry) = courses.get_mut(course_id) else {
            return Err(CollaboratorError::invalid("unknown course"));
        };
        entry.1 = sections.to_vec();
        Ok(())
    }

    async fn fetch_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<(CourseRecord, Vec<SectionRecord>)>, CollaboratorError> {
        Ok(self
            .courses
            .lock()
            .expect("courses lock")
            .get(course_id)
            .cloned())
    }
}
