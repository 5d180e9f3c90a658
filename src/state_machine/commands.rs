//! Side-effect descriptions emitted by the reducer.
//!
//! Commands are plain data: the reducer describes what should happen,
//! the executor performs it. Commands are serialized into the state
//! record's pending queue so a crashed run resumes exactly where it
//! stopped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The named LLM task. Selects both the prompt template and, through
/// the driver's registry, the event the completion becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmTask {
    GenerateParts,
    GeneratePartSections,
    ReviewOutline,
}

impl LlmTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateParts => "generate_parts",
            Self::GeneratePartSections => "generate_part_sections",
            Self::ReviewOutline => "review_outline",
        }
    }
}

/// A description of one side-effecting operation for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Embed the given text with the embedding collaborator.
    EmbedText { text: String },
    /// Ranked similarity search over the source corpus.
    SearchSources {
        vector: Vec<f32>,
        top_k: usize,
        min_similarity: f32,
    },
    /// Render the named prompt template and call the language model.
    InvokeLlm {
        task: LlmTask,
        prompt_vars: BTreeMap<String, String>,
        temperature: f32,
        max_tokens: u32,
    },
    /// Idempotent upsert of the course record.
    PersistCourse,
    /// Idempotent upsert of the course's section records.
    PersistSections,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::EmbedText { .. } => CommandKind::EmbedText,
            Self::SearchSources { .. } => CommandKind::SearchSources,
            Self::InvokeLlm { .. } => CommandKind::InvokeLlm,
            Self::PersistCourse => CommandKind::PersistCourse,
            Self::PersistSections => CommandKind::PersistSections,
        }
    }

    /// The LLM task carried by this command, if any. Registry lookups
    /// key on `(kind, task)`.
    pub fn llm_task(&self) -> Option<LlmTask> {
        match self {
            Self::InvokeLlm { task, .. } => Some(*task),
            _ => None,
        }
    }
}

/// Discriminant used as a registry key and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    EmbedText,
    SearchSources,
    InvokeLlm,
    PersistCourse,
    PersistSections,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbedText => "embed_text",
            Self::SearchSources => "search_sources",
            Self::InvokeLlm => "invoke_llm",
            Self::PersistCourse => "persist_course",
            Self::PersistSections => "persist_sections",
        }
    }
}
