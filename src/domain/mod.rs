//! Domain model for course generation.
//!
//! Strongly typed primitives and the error taxonomy used across the
//! reducer, executor, and driver. Everything in here is plain data:
//! no I/O, no collaborator calls.

pub mod errors;
pub mod types;

pub use errors::GenerationError;
pub use types::{CourseId, Part, Preferences, Section, SourceHit, TimestampUtc};
