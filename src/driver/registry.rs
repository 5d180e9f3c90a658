//! Explicit mapping from executed commands to reducer events.
//!
//! New phases are added by registering an entry here, never by editing
//! a monolithic conditional in the driver loop.

use crate::executor::ExecutionPayload;
use crate::state::CourseGenerationState;
use crate::state_machine::{Command, CommandKind, Event, LlmTask};

/// What a successful command maps to.
#[derive(Debug)]
pub enum MapOutcome {
    /// Feed this event to the reducer.
    Event(Event),
    /// No event; the driver advances to the next pending command.
    Advance,
    /// The registry or payload is inconsistent, which is a driver defect.
    Mismatch(String),
}

type EventCtor = fn(&CourseGenerationState, ExecutionPayload) -> MapOutcome;

struct RegistryEntry {
    kind: CommandKind,
    task: Option<LlmTask>,
    ctor: EventCtor,
}

/// The `(command kind, task) → event constructor` table.
pub struct EventRegistry {
    entries: Vec<RegistryEntry>,
}

impl EventRegistry {
    /// Registry covering the standard pipeline.
    pub fn standard() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register(CommandKind::EmbedText, None, embedding_generated);
        registry.register(CommandKind::SearchSources, None, sources_found);
        registry.register(
            CommandKind::InvokeLlm,
            Some(LlmTask::GenerateParts),
            parts_generated,
        );
        registry.register(
            CommandKind::InvokeLlm,
            Some(LlmTask::GeneratePartSections),
            part_sections_generated,
        );
        registry.register(
            CommandKind::InvokeLlm,
            Some(LlmTask::ReviewOutline),
            outline_reviewed,
        );
        registry.register(CommandKind::PersistCourse, None, course_persisted);
        registry.register(CommandKind::PersistSections, None, sections_persisted);
        registry
    }

    pub fn register(&mut self, kind: CommandKind, task: Option<LlmTask>, ctor: EventCtor) {
        self.entries.push(RegistryEntry { kind, task, ctor });
    }

    /// Maps a successful command execution to its follow-up.
    pub fn map(
        &self,
        command: &Command,
        state: &CourseGenerationState,
        payload: ExecutionPayload,
    ) -> MapOutcome {
        let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.kind == command.kind() && e.task == command.llm_task())
        else {
            return MapOutcome::Mismatch(format!(
                "no event mapping registered for command '{}'",
                command.kind().as_str()
            ));
        };
        (entry.ctor)(state, payload)
    }
}

fn embedding_generated(_state: &CourseGenerationState, payload: ExecutionPayload) -> MapOutcome {
    match payload {
        ExecutionPayload::Vector(vector) => MapOutcome::Event(Event::EmbeddingGenerated { vector }),
        _ => MapOutcome::Mismatch("embed command produced a non-vector payload".to_string()),
    }
}

fn sources_found(_state: &CourseGenerationState, payload: ExecutionPayload) -> MapOutcome {
    match payload {
        ExecutionPayload::Sources(sources) => MapOutcome::Event(Event::SourcesFound { sources }),
        _ => MapOutcome::Mismatch("search command produced a non-source payload".to_string()),
    }
}

fn parts_generated(_state: &CourseGenerationState, payload: ExecutionPayload) -> MapOutcome {
    match payload {
        ExecutionPayload::Text(parts_text) => {
            MapOutcome::Event(Event::PartsGenerated { parts_text })
        }
        _ => MapOutcome::Mismatch("parts task produced a non-text payload".to_string()),
    }
}

fn part_sections_generated(state: &CourseGenerationState, payload: ExecutionPayload) -> MapOutcome {
    match payload {
        ExecutionPayload::Text(sections_text) => MapOutcome::Event(Event::PartSectionsGenerated {
            part_index: state.current_part_index,
            sections_text,
        }),
        _ => MapOutcome::Mismatch("sections task produced a non-text payload".to_string()),
    }
}

fn outline_reviewed(_state: &CourseGenerationState, payload: ExecutionPayload) -> MapOutcome {
    match payload {
        ExecutionPayload::Text(outline_text) => {
            MapOutcome::Event(Event::OutlineReviewed { outline_text })
        }
        _ => MapOutcome::Mismatch("review task produced a non-text payload".to_string()),
    }
}

fn course_persisted(_state: &CourseGenerationState, _payload: ExecutionPayload) -> MapOutcome {
    // Sections still need to be stored; CourseStored fires after both.
    MapOutcome::Advance
}

fn sections_persisted(_state: &CourseGenerationState, _payload: ExecutionPayload) -> MapOutcome {
    MapOutcome::Event(Event::CourseStored)
}
