//! Orchestrator driver: threads commands into events until the
//! pipeline reaches a terminal status.
//!
//! The loop is deliberately stateless across iterations: every pass
//! reloads the record from the state store, executes the head of the
//! durable command queue, maps the outcome to the next event through
//! the registry, reduces, and persists. A crash at any point resumes
//! from the last durably recorded state and pending command.

mod registry;

pub use registry::{EventRegistry, MapOutcome};

use crate::config::GenerationConfig;
use crate::domain::{CourseId, GenerationError, TimestampUtc};
use crate::executor::{CommandExecutor, ExecutionOutcome};
use crate::state::{CourseGenerationState, CourseStatus};
use crate::state_machine::{Event, Reducer};
use crate::state_store::{StateStore, StateStoreError};
use crate::structured_logger::GenerationLogger;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Drives one course's pipeline to a terminal status.
pub struct Orchestrator {
    reducer: Reducer,
    executor: CommandExecutor,
    state_store: Arc<dyn StateStore>,
    registry: EventRegistry,
    logger: Arc<GenerationLogger>,
    config: GenerationConfig,
}

impl Orchestrator {
    pub fn new(
        executor: CommandExecutor,
        state_store: Arc<dyn StateStore>,
        logger: Arc<GenerationLogger>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            reducer: Reducer::new(config.clone()),
            executor,
            state_store,
            registry: EventRegistry::standard(),
            logger,
            config,
        }
    }

    /// Runs the loop until the course reaches a terminal status or an
    /// unrecoverable infrastructure error (state store unreachable)
    /// surfaces to the caller.
    pub async fn run(&self, course_id: &CourseId) -> Result<CourseGenerationState> {
        let mut iterations: u32 = 0;

        loop {
            let mut state = self
                .load(course_id)
                .await?
                .with_context(|| format!("no state record for course {}", course_id))?;

            if state.status.is_terminal() {
                self.logger
                    .log_run_complete(state.status.as_str(), iterations);
                return Ok(state);
            }

            // The reducer short-circuits on the cancel flag no matter
            // which event carries it in.
            if state.cancel_requested {
                self.apply(
                    state,
                    Event::GenerationFailed {
                        reason: "cancel requested".to_string(),
                    },
                )
                .await?;
                continue;
            }

            let Some(command) = state.pending_commands.first().cloned() else {
                // Between the last section batch and variance checking
                // there is no side effect to run; the driver feeds the
                // synthetic AllPartsComplete event.
                if state.outline_complete && state.status == CourseStatus::GeneratingSections {
                    self.apply(state, Event::AllPartsComplete).await?;
                    continue;
                }
                self.apply(
                    state,
                    Event::GenerationFailed {
                        reason: "driver stalled: no pending commands in a non-terminal phase"
                            .to_string(),
                    },
                )
                .await?;
                continue;
            };

            iterations += 1;
            if iterations > self.config.max_driver_iterations {
                let reason = GenerationError::IterationLimitExceeded {
                    limit: self.config.max_driver_iterations,
                }
                .to_string();
                self.apply(state, Event::GenerationFailed { reason }).await?;
                continue;
            }

            self.logger.log_command(&command);
            let outcome = self.executor.execute(&command, &state).await;

            // The executed head leaves the queue; the reducer appends
            // whatever comes next.
            state.pending_commands.remove(0);

            match outcome {
                ExecutionOutcome::Success(payload) => {
                    match self.registry.map(&command, &state, payload) {
                        MapOutcome::Event(event) => {
                            self.apply(state, event).await?;
                        }
                        MapOutcome::Advance => {
                            self.persist(&mut state).await?;
                        }
                        MapOutcome::Mismatch(reason) => {
                            self.apply(state, Event::GenerationFailed { reason }).await?;
                        }
                    }
                }
                ExecutionOutcome::Failure { message } => {
                    self.apply(state, Event::GenerationFailed { reason: message })
                        .await?;
                }
            }
        }
    }

    /// Reduces one event and durably persists the result.
    async fn apply(
        &self,
        state: CourseGenerationState,
        event: Event,
    ) -> Result<CourseGenerationState> {
        self.logger.log_event(&event);
        let before = state.status.clone();

        let transition = self.reducer.reduce(state, event);
        let mut state = transition.state;

        if state.status.is_terminal() {
            state.pending_commands.clear();
        } else {
            state.pending_commands.extend(transition.commands);
        }

        if state.status != before {
            self.logger.log_phase_transition(
                before.as_str(),
                state.status.as_str(),
                &transition.message,
            );
        }
        tracing::info!(course = %state.course_id, "{}", transition.message);

        self.persist(&mut state).await?;
        Ok(state)
    }

    async fn load(&self, course_id: &CourseId) -> Result<Option<CourseGenerationState>> {
        self.state_store
            .get(course_id)
            .await
            .map_err(anyhow::Error::new)
    }

    /// Version-checked write. A conflict is retried once after
    /// refreshing the stored version (picking up any out-of-band
    /// cancel flag); a second conflict is surfaced.
    async fn persist(&self, state: &mut CourseGenerationState) -> Result<()> {
        state.touch(TimestampUtc::now());
        match self.state_store.put(state).await {
            Ok(()) => Ok(()),
            Err(StateStoreError::VersionConflict { .. }) => {
                if let Some(current) = self.load(&state.course_id).await? {
                    state.version = current.version;
                    if current.cancel_requested {
                        state.cancel_requested = true;
                    }
                }
                state.touch(TimestampUtc::now());
                self.state_store.put(state).await.map_err(|e| {
                    anyhow::Error::new(GenerationError::ConcurrencyConflict {
                        message: e.to_string(),
                    })
                })
            }
            Err(e) => Err(anyhow::Error::new(e)),
        }
    }
}
