//! Local reference collaborators.
//!
//! These run the pipeline end to end without external services: a
//! deterministic feature-hash embedder, cosine search over a JSONL
//! corpus, a subprocess-backed language model, and a file-backed
//! course repository with atomic upserts.

use crate::collaborators::{
    CollaboratorError, CourseRecord, CourseRepository, Embedder, LanguageModel, SectionRecord,
    SourceSearcher,
};
use crate::domain::{CourseId, SourceHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as ProcessCommand;

/// Deterministic feature-hash embedder: token unigrams and bigrams are
/// hashed into a fixed-dimension vector, then L2-normalized. Good
/// enough for local corpora and fully reproducible in tests.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() % dimension as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect();

        if tokens.is_empty() {
            return Err(CollaboratorError::invalid(
                "cannot embed text with no tokens",
            ));
        }

        for token in &tokens {
            vector[bucket(token, self.dimension)] += 1.0;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[bucket(&bigram, self.dimension)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// One corpus entry: a pre-embedded source summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorpusEntry {
    source_id: String,
    title: String,
    summary: String,
    #[serde(default)]
    version: i64,
    embedding: Vec<f32>,
}

/// Cosine similarity search over a JSONL corpus file. The corpus is
/// re-read per call; source collections small enough for a local agent
/// make caching not worth the staleness.
pub struct JsonlSourceSearcher {
    corpus_path: PathBuf,
}

impl JsonlSourceSearcher {
    pub fn new(corpus_path: PathBuf) -> Self {
        Self { corpus_path }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl SourceSearcher for JsonlSourceSearcher {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SourceHit>, CollaboratorError> {
        let content = match tokio::fs::read_to_string(&self.corpus_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    corpus = %self.corpus_path.display(),
                    "source corpus missing, searching over nothing"
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(CollaboratorError::unavailable(format!(
                    "reading corpus {}: {}",
                    self.corpus_path.display(),
                    e
                )))
            }
        };

        let mut hits: Vec<SourceHit> = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let entry: CorpusEntry = serde_json::from_str(line).map_err(|e| {
                CollaboratorError::invalid(format!("malformed corpus line: {}", e))
            })?;
            let similarity = cosine(vector, &entry.embedding);
            if similarity >= min_similarity {
                hits.push(SourceHit {
                    source_id: entry.source_id,
                    title: entry.title,
                    summary: entry.summary,
                    similarity,
                    version: entry.version,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.version.cmp(&a.version))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Language model backed by a configured subprocess: the prompt goes
/// to stdin, the completion comes back on stdout. Sampling parameters
/// are accepted for interface compatibility; CLI backends own their
/// sampling.
pub struct SubprocessModel {
    command: String,
    args: Vec<String>,
}

impl SubprocessModel {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }
}

#[async_trait]
impl LanguageModel for SubprocessModel {
    async fn complete(
        &self,
        prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        let mut child = ProcessCommand::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CollaboratorError::unavailable(format!(
                    "spawning model command '{}': {}",
                    self.command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| CollaboratorError::unavailable(format!("writing prompt: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CollaboratorError::unavailable(format!("awaiting model: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let line = stderr.lines().next().unwrap_or("no stderr");
            return Err(CollaboratorError::invalid(format!(
                "model command exited with {}: {}",
                output.status, line
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(CollaboratorError::invalid("model returned empty output"));
        }
        Ok(text)
    }
}

/// Stored course document: the course row plus its section rows, one
/// JSON file per course.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CourseDocument {
    course: CourseRecord,
    #[serde(default)]
    sections: Vec<SectionRecord>,
}

/// File-backed course repository. Upserts are atomic (temp file +
/// rename) and keyed by course id, so repeated persistence of the same
/// payload leaves exactly one document.
pub struct FileCourseRepository {
    dir: PathBuf,
}

impl FileCourseRepository {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn course_path(&self, course_id: &CourseId) -> PathBuf {
        self.dir.join(format!("{}.json", course_id))
    }

    fn read_document(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseDocument>, CollaboratorError> {
        let path = self.course_path(course_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CollaboratorError::unavailable(format!(
                    "reading course {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CollaboratorError::invalid(format!("corrupt course document: {}", e)))
    }

    fn write_document(&self, document: &CourseDocument) -> Result<(), CollaboratorError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            CollaboratorError::unavailable(format!("creating course dir: {}", e))
        })?;
        let path = self.course_path(&document.course.course_id);
        let content = serde_json::to_string_pretty(document)
            .map_err(|e| CollaboratorError::invalid(format!("serializing course: {}", e)))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .map_err(|e| CollaboratorError::unavailable(format!("writing course: {}", e)))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| CollaboratorError::unavailable(format!("renaming course: {}", e)))
    }
}

#[async_trait]
impl CourseRepository for FileCourseRepository {
    async fn upsert_course(&self, course: &CourseRecord) -> Result<(), CollaboratorError> {
        let sections = self
            .read_document(&course.course_id)?
            .map(|d| d.sections)
            .unwrap_or_default();
        self.write_document(&CourseDocument {
            course: course.clone(),
            sections,
        })
    }

    async fn upsert_sections(
        &self,
        course_id: &CourseId,
        sections: &[SectionRecord],
    ) -> Result<(), CollaboratorError> {
        let Some(mut document) = self.read_document(course_id)? else {
            return Err(CollaboratorError::invalid(format!(
                "cannot store sections for unknown course {}",
                course_id
            )));
        };
        document.sections = sections.to_vec();
        self.write_document(&document)
    }

    async fn fetch_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<(CourseRecord, Vec<SectionRecord>)>, CollaboratorError> {
        Ok(self
            .read_document(course_id)?
            .map(|d| (d.course, d.sections)))
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
