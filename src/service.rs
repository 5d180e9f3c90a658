//! External surface of the course generator: start, poll, retrieve,
//! cancel.
//!
//! Validation happens here, before any state is created. Everything
//! after validation goes through the reducer and the versioned state
//! store; this module never mutates pipeline state directly.

use crate::collaborators::{CourseRecord, CourseRepository, SectionRecord};
use crate::config::GenerationConfig;
use crate::domain::{CourseId, GenerationError, Preferences, TimestampUtc};
use crate::state::{CourseGenerationState, StateSnapshot};
use crate::state_machine::{Event, Reducer};
use crate::state_store::{StateStore, StateStoreError};
use serde::Serialize;
use std::sync::Arc;

/// A learning request as received from the outside.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub query: String,
    pub target_duration_hours: f64,
    pub preferences: Preferences,
}

/// Acknowledgement of an accepted request.
#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub course_id: CourseId,
    pub status: &'static str,
}

/// Progress report for one course.
#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub status: &'static str,
    pub phase: &'static str,
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A finished course with its sections.
#[derive(Debug, Clone, Serialize)]
pub struct CourseBundle {
    pub course: CourseRecord,
    pub sections: Vec<SectionRecord>,
}

/// The start/poll/retrieve/cancel surface.
pub struct CourseService {
    state_store: Arc<dyn StateStore>,
    repository: Arc<dyn CourseRepository>,
    reducer: Reducer,
    config: GenerationConfig,
}

impl CourseService {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        repository: Arc<dyn CourseRepository>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            state_store,
            repository,
            reducer: Reducer::new(config.clone()),
            config,
        }
    }

    /// Validates the request, creates the state record via the
    /// reducer's CourseRequested transition, and persists it with the
    /// first command queued. The driver takes over from there.
    pub async fn start(&self, request: StartRequest) -> Result<StartResponse, GenerationError> {
        let target_minutes = validate(&request)?;

        let now = TimestampUtc::now();
        let course_id = CourseId::new();
        let state = CourseGenerationState::new(
            course_id.clone(),
            now,
            self.config.state_ttl_seconds(),
        );

        let transition = self.reducer.reduce(
            state,
            Event::CourseRequested {
                query: request.query.trim().to_string(),
                target_duration_minutes: target_minutes,
                preferences: request.preferences,
            },
        );
        let mut state = transition.state;
        state.pending_commands = transition.commands;

        self.state_store
            .put(&mut state)
            .await
            .map_err(store_error)?;

        Ok(StartResponse {
            course_id,
            status: "processing",
        })
    }

    /// Reports progress. Courses whose state record has expired but
    /// whose durable course exists report complete.
    pub async fn poll(&self, course_id: &CourseId) -> Result<PollResponse, GenerationError> {
        if let Some(state) = self
            .state_store
            .get(course_id)
            .await
            .map_err(store_error)?
        {
            let snapshot = StateSnapshot::from(&state);
            return Ok(PollResponse {
                status: state.status.public_label(),
                phase: snapshot.phase,
                progress: snapshot.progress,
                error: snapshot.error_message,
            });
        }

        let stored = self
            .repository
            .fetch_course(course_id)
            .await
            .map_err(|e| GenerationError::Collaborator {
                message: e.to_string(),
            })?;
        match stored {
            Some(_) => Ok(PollResponse {
                status: "complete",
                phase: "complete",
                progress: 1.0,
                error: None,
            }),
            None => Err(GenerationError::Validation {
                message: format!("unknown course id {}", course_id),
            }),
        }
    }

    /// Fetches the stored course and its sections.
    pub async fn retrieve(&self, course_id: &CourseId) -> Result<CourseBundle, GenerationError> {
        let stored = self
            .repository
            .fetch_course(course_id)
            .await
            .map_err(|e| GenerationError::Collaborator {
                message: e.to_string(),
            })?;
        match stored {
            Some((course, sections)) => Ok(CourseBundle { course, sections }),
            None => Err(GenerationError::Validation {
                message: format!("no stored course for id {}", course_id),
            }),
        }
    }

    /// Sets the out-of-band cancel flag. The reducer short-circuits to
    /// the terminal cancelled status on its next transition.
    pub async fn cancel(&self, course_id: &CourseId) -> Result<(), GenerationError> {
        let Some(mut state) = self
            .state_store
            .get(course_id)
            .await
            .map_err(store_error)?
        else {
            return Err(GenerationError::Validation {
                message: format!("unknown course id {}", course_id),
            });
        };
        state.cancel_requested = true;
        self.state_store
            .put(&mut state)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// Request validation; rejected requests never create state.
fn validate(request: &StartRequest) -> Result<u32, GenerationError> {
    if request.query.trim().is_empty() {
        return Err(GenerationError::Validation {
            message: "query must not be empty".to_string(),
        });
    }
    if !request.target_duration_hours.is_finite() || request.target_duration_hours <= 0.0 {
        return Err(GenerationError::Validation {
            message: "target duration must be a positive number of hours".to_string(),
        });
    }
    if request.target_duration_hours > 100.0 {
        return Err(GenerationError::Validation {
            message: "target duration above 100 hours is not supported".to_string(),
        });
    }
    let minutes = (request.target_duration_hours * 60.0).round() as u32;
    Ok(minutes.max(1))
}

fn store_error(e: StateStoreError) -> GenerationError {
    match e {
        StateStoreError::VersionConflict { expected, actual } => {
            GenerationError::ConcurrencyConflict {
                message: format!("expected version {}, stored {}", expected, actual),
            }
        }
        other => GenerationError::Collaborator {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
