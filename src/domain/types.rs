//! Strongly typed domain primitives for course generation.
//!
//! These newtypes provide type safety and semantic clarity for course
//! identifiers and timestamps, plus the outline structures (parts,
//! sections, retrieved sources) that travel through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a course generation run.
/// Used as the record key in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub Uuid);

impl CourseId {
    /// Creates a new random course ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a course ID from a string.
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for CourseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CourseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC timestamp wrapper used throughout persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampUtc(pub DateTime<Utc>);

impl TimestampUtc {
    /// Returns the current UTC timestamp.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Seconds since the Unix epoch, used for TTL comparisons.
    pub fn epoch_seconds(&self) -> i64 {
        self.0.timestamp()
    }
}

impl std::fmt::Display for TimestampUtc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// User preferences attached to a learning request.
///
/// All fields are free text; they are folded into prompts verbatim and
/// never interpreted by the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub pace: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Preferences {
    /// Renders preferences as a single prompt-friendly line.
    /// Returns "none stated" when every field is empty.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(depth) = &self.depth {
            parts.push(format!("depth: {}", depth));
        }
        if let Some(pace) = &self.pace {
            parts.push(format!("pace: {}", pace));
        }
        if let Some(style) = &self.style {
            parts.push(format!("style: {}", style));
        }
        if let Some(notes) = &self.notes {
            parts.push(format!("notes: {}", notes));
        }
        if parts.is_empty() {
            "none stated".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// One ranked hit from the source search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHit {
    pub source_id: String,
    pub title: String,
    pub summary: String,
    /// Cosine similarity against the request embedding, in [0, 1].
    pub similarity: f32,
    /// Monotonic source version; newer versions win similarity ties.
    #[serde(default)]
    pub version: i64,
}

/// A top-level outline grouping with a target time budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Zero-based position in the outline.
    pub index: usize,
    pub title: String,
    pub target_minutes: u32,
    /// Filled in as each part's sections are generated.
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// The smallest planned course unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub content_summary: String,
}
