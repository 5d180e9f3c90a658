//! Error taxonomy for the course generation pipeline.

use std::fmt::{Display, Formatter};

/// Errors that can occur while generating a course.
///
/// The reducer and executor never return these directly; failures there
/// are explicit transition/outcome values. This type names the failure
/// classes so reasons are worded consistently wherever they surface.
#[derive(Debug, Clone)]
pub enum GenerationError {
    /// Malformed request, rejected before any state is created.
    Validation { message: String },
    /// Outline or time parsing failed in a phase that cannot tolerate it.
    Parse { message: String },
    /// A collaborator (embed/search/LLM/store) failed after retries.
    Collaborator { message: String },
    /// Optimistic lock failure (concurrent modification detected).
    ConcurrencyConflict { message: String },
    /// The driver loop exceeded its iteration cap.
    IterationLimitExceeded { limit: u32 },
    /// An event arrived for the wrong phase, which indicates a driver defect.
    UnexpectedEvent { event: String, status: String },
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { message } => write!(f, "invalid request: {}", message),
            Self::Parse { message } => write!(f, "parse failure: {}", message),
            Self::Collaborator { message } => write!(f, "collaborator failure: {}", message),
            Self::ConcurrencyConflict { message } => {
                write!(f, "concurrency conflict: {}", message)
            }
            Self::IterationLimitExceeded { limit } => {
                write!(f, "exceeded max iterations ({})", limit)
            }
            Self::UnexpectedEvent { event, status } => {
                write!(f, "unexpected event '{}' in phase '{}'", event, status)
            }
        }
    }
}

impl std::error::Error for GenerationError {}
