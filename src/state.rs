//! Persisted course generation state.
//!
//! One keyed record per course, mutated exclusively by the reducer and
//! written through the versioned state store. All context that crosses a
//! phase boundary travels in this record; no in-memory state survives
//! between phases.

use crate::domain::{CourseId, Part, Preferences, SourceHit, TimestampUtc};
use crate::state_machine::Command;
use serde::{Deserialize, Serialize};

/// Pipeline status for a course generation run.
///
/// `Pending` is the zero value of a freshly constructed record; the
/// CourseRequested event moves it to `Embedding`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Pending,
    Embedding,
    SearchingSources,
    GeneratingParts,
    GeneratingSections,
    ReviewingOutline,
    Storing,
    Complete,
    Error,
    Cancelled,
}

impl CourseStatus {
    /// Returns true for statuses that accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }

    /// Internal phase name, stable across serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Embedding => "embedding",
            Self::SearchingSources => "searching_sources",
            Self::GeneratingParts => "generating_parts",
            Self::GeneratingSections => "generating_sections",
            Self::ReviewingOutline => "reviewing_outline",
            Self::Storing => "storing",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// User-visible status. Externally a course is only ever
    /// `processing`, `complete`, or `error`.
    pub fn public_label(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Error | Self::Cancelled => "error",
            _ => "processing",
        }
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single persisted record for one course generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseGenerationState {
    pub course_id: CourseId,
    pub status: CourseStatus,
    pub query: String,
    pub target_duration_minutes: u32,
    #[serde(default)]
    pub preferences: Preferences,
    /// Ranked search hits, best first.
    #[serde(default)]
    pub candidate_sources: Vec<SourceHit>,
    /// Ordered outline parts; empty until PartsGenerated.
    #[serde(default)]
    pub parts_list: Vec<Part>,
    /// Index of the next part awaiting section generation.
    #[serde(default)]
    pub current_part_index: usize,
    /// Accumulated outline text. Append-only until the review phase
    /// replaces it wholesale.
    #[serde(default)]
    pub outline_text: String,
    #[serde(default)]
    pub outline_complete: bool,
    #[serde(default)]
    pub review_iteration_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Out-of-band cancellation flag, checked at the top of every
    /// reducer transition.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Durably recorded command queue; the head is the command in
    /// flight. Crash recovery resumes from here.
    #[serde(default)]
    pub pending_commands: Vec<Command>,
    pub created_at: TimestampUtc,
    pub updated_at: TimestampUtc,
    /// Unix epoch seconds after which the record is expired and removed
    /// regardless of terminal status.
    pub ttl: i64,
    /// Optimistic concurrency version, incremented on every store write.
    #[serde(default)]
    pub version: u64,
}

impl CourseGenerationState {
    /// Creates a pristine record for a new course.
    pub fn new(course_id: CourseId, now: TimestampUtc, ttl_seconds: i64) -> Self {
        Self {
            course_id,
            status: CourseStatus::Pending,
            query: String::new(),
            target_duration_minutes: 0,
            preferences: Preferences::default(),
            candidate_sources: Vec::new(),
            parts_list: Vec::new(),
            current_part_index: 0,
            outline_text: String::new(),
            outline_complete: false,
            review_iteration_count: 0,
            error_message: None,
            cancel_requested: false,
            pending_commands: Vec::new(),
            created_at: now,
            updated_at: now,
            ttl: now.epoch_seconds() + ttl_seconds,
            version: 0,
        }
    }

    /// Updates the modification timestamp. Called by writers before
    /// persisting, never by the reducer.
    pub fn touch(&mut self, now: TimestampUtc) {
        self.updated_at = now;
    }

    /// True once the record has outlived its TTL.
    pub fn is_expired(&self, now: TimestampUtc) -> bool {
        now.epoch_seconds() > self.ttl
    }

    /// Titles of parts whose sections have not been generated yet.
    pub fn remaining_part_titles(&self) -> Vec<String> {
        self.parts_list
            .iter()
            .skip(self.current_part_index)
            .map(|p| p.title.clone())
            .collect()
    }
}

/// Read-only snapshot of generation state for external observation.
/// Callers never mutate this; it is derived fresh from the record.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub course_id: CourseId,
    pub status: CourseStatus,
    pub phase: &'static str,
    /// Coarse progress in [0, 1] for display purposes only.
    pub progress: f32,
    pub parts_total: usize,
    pub parts_expanded: usize,
    pub review_iteration_count: u32,
    pub error_message: Option<String>,
    pub updated_at: TimestampUtc,
}

impl From<&CourseGenerationState> for StateSnapshot {
    fn from(state: &CourseGenerationState) -> Self {
        Self {
            course_id: state.course_id.clone(),
            status: state.status.clone(),
            phase: state.status.as_str(),
            progress: progress_for(state),
            parts_total: state.parts_list.len(),
            parts_expanded: state.current_part_index,
            review_iteration_count: state.review_iteration_count,
            error_message: state.error_message.clone(),
            updated_at: state.updated_at,
        }
    }
}

fn progress_for(state: &CourseGenerationState) -> f32 {
    match state.status {
        CourseStatus::Pending => 0.0,
        CourseStatus::Embedding => 0.1,
        CourseStatus::SearchingSources => 0.2,
        CourseStatus::GeneratingParts => 0.35,
        CourseStatus::GeneratingSections => {
            let total = state.parts_list.len().max(1) as f32;
            0.35 + 0.45 * (state.current_part_index as f32 / total)
        }
        CourseStatus::ReviewingOutline => 0.85,
        CourseStatus::Storing => 0.95,
        CourseStatus::Complete => 1.0,
        CourseStatus::Error | CourseStatus::Cancelled => 1.0,
    }
}
