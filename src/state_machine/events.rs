//! Events fed into the reducer.
//!
//! Each event is a fact about the pipeline: a request arrived, a
//! collaborator produced a result, storage finished, something failed.
//! The reducer is the only consumer.

use crate::domain::{Preferences, SourceHit};
use serde::Serialize;

/// A fact for the reducer to fold into state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A validated learning request; creates the course.
    CourseRequested {
        query: String,
        target_duration_minutes: u32,
        preferences: Preferences,
    },
    /// The embedder returned the request vector.
    EmbeddingGenerated { vector: Vec<f32> },
    /// Ranked source hits, best first. May be empty.
    SourcesFound { sources: Vec<SourceHit> },
    /// Raw LLM output of the parts-generation task.
    PartsGenerated { parts_text: String },
    /// Raw LLM output for one part's sections.
    PartSectionsGenerated {
        part_index: usize,
        sections_text: String,
    },
    /// Every part has been expanded; time to check variance.
    AllPartsComplete,
    /// The review task returned a corrected outline.
    OutlineReviewed { outline_text: String },
    /// Course and sections are durably stored.
    CourseStored,
    /// Any failure the pipeline cannot recover from.
    GenerationFailed { reason: String },
}

impl Event {
    /// Stable event name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CourseRequested { .. } => "CourseRequested",
            Self::EmbeddingGenerated { .. } => "EmbeddingGenerated",
            Self::SourcesFound { .. } => "SourcesFound",
            Self::PartsGenerated { .. } => "PartsGenerated",
            Self::PartSectionsGenerated { .. } => "PartSectionsGenerated",
            Self::AllPartsComplete => "AllPartsComplete",
            Self::OutlineReviewed { .. } => "OutlineReviewed",
            Self::CourseStored => "CourseStored",
            Self::GenerationFailed { .. } => "GenerationFailed",
        }
    }
}
