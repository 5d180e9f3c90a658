//! Centralized reducer for course generation state.
//!
//! This module is the ONLY place where state transitions happen. The
//! reducer folds one event into the state record and returns the next
//! commands for the executor. It is pure and deterministic: no clocks,
//! no I/O, no panics. Any invalid input becomes a GenerationFailed
//! transition with a descriptive reason instead of an error.

mod commands;
mod events;

pub use commands::{Command, CommandKind, LlmTask};
pub use events::Event;

use crate::config::GenerationConfig;
use crate::domain::{GenerationError, SourceHit};
use crate::outline::parser;
use crate::outline::variance::{self, VarianceVerdict};
use crate::state::{CourseGenerationState, CourseStatus};
use std::collections::BTreeMap;

/// Result of one reducer step: the new state, the commands to execute
/// next, and a human-readable progress message.
#[derive(Debug)]
pub struct Transition {
    pub state: CourseGenerationState,
    pub commands: Vec<Command>,
    pub message: String,
}

/// Textual part-count guidance passed to the parts-generation prompt.
/// Guidance, not a hard constraint: the parser accepts whatever comes
/// back.
pub fn part_count_guidance(target_minutes: u32) -> &'static str {
    if target_minutes < 120 {
        "Create exactly one part. Keep the part at or under 120 minutes."
    } else if target_minutes < 240 {
        "Create 2 to 3 parts. Keep each part at or under 120 minutes."
    } else {
        "Create 3 to 5 parts. Keep each part at or under 120 minutes."
    }
}

/// The pure state-transition reducer.
pub struct Reducer {
    config: GenerationConfig,
}

impl Reducer {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    /// Folds one event into the state. Never panics; unexpected input
    /// transitions to the terminal error status.
    pub fn reduce(&self, mut state: CourseGenerationState, event: Event) -> Transition {
        // Out-of-band cancellation wins over whatever event arrived.
        if state.cancel_requested && !state.status.is_terminal() {
            state.status = CourseStatus::Cancelled;
            state.error_message = Some("generation cancelled".to_string());
            return Transition {
                state,
                commands: Vec::new(),
                message: "generation cancelled".to_string(),
            };
        }

        match event {
            Event::CourseRequested {
                query,
                target_duration_minutes,
                preferences,
            } => {
                if state.status != CourseStatus::Pending {
                    return self.unexpected(state, "CourseRequested");
                }
                state.query = query;
                state.target_duration_minutes = target_duration_minutes;
                state.preferences = preferences;
                state.status = CourseStatus::Embedding;
                let text = state.query.clone();
                Transition {
                    state,
                    commands: vec![Command::EmbedText { text }],
                    message: "embedding learning request".to_string(),
                }
            }

            Event::EmbeddingGenerated { vector } => {
                if state.status != CourseStatus::Embedding {
                    return self.unexpected(state, "EmbeddingGenerated");
                }
                if vector.is_empty() {
                    return self.fail(state, "embedder returned an empty vector");
                }
                state.status = CourseStatus::SearchingSources;
                let command = Command::SearchSources {
                    vector,
                    top_k: self.config.search.top_k,
                    min_similarity: self.config.search.min_similarity,
                };
                Transition {
                    state,
                    commands: vec![command],
                    message: "searching for source material".to_string(),
                }
            }

            Event::SourcesFound { sources } => {
                if state.status != CourseStatus::SearchingSources {
                    return self.unexpected(state, "SourcesFound");
                }
                let found = sources.len();
                state.candidate_sources = sources;
                state.status = CourseStatus::GeneratingParts;
                let command = self.generate_parts_command(&state);
                Transition {
                    state,
                    commands: vec![command],
                    message: format!("found {} candidate sources, generating parts", found),
                }
            }

            Event::PartsGenerated { parts_text } => {
                if state.status != CourseStatus::GeneratingParts {
                    return self.unexpected(state, "PartsGenerated");
                }
                let parts = parser::parse_parts_text(&parts_text);
                if parts.is_empty() {
                    let reason = GenerationError::Parse {
                        message: "no part headers found in parts output".to_string(),
                    };
                    return self.fail(state, &reason.to_string());
                }
                let count = parts.len();
                state.parts_list = parts;
                state.current_part_index = 0;
                state.outline_text = format!("{}\n\n", parts_text.trim_end());
                state.status = CourseStatus::GeneratingSections;
                let command = self.generate_sections_command(&state);
                Transition {
                    state,
                    commands: vec![command],
                    message: format!("generated {} parts, expanding sections", count),
                }
            }

            Event::PartSectionsGenerated {
                part_index,
                sections_text,
            } => {
                if state.status != CourseStatus::GeneratingSections {
                    return self.unexpected(state, "PartSectionsGenerated");
                }
                if part_index != state.current_part_index {
                    let expected = state.current_part_index;
                    return self.fail(
                        state,
                        &format!(
                            "sections for part {} arrived while part {} was in flight",
                            part_index + 1,
                            expected + 1
                        ),
                    );
                }
                state
                    .outline_text
                    .push_str(&format!("{}\n\n", sections_text.trim_end()));
                let sections = parser::parse_sections_text(&sections_text);
                if let Some(part) = state.parts_list.get_mut(part_index) {
                    part.sections = sections;
                }
                state.current_part_index += 1;

                if state.current_part_index < state.parts_list.len() {
                    let done = state.current_part_index;
                    let total = state.parts_list.len();
                    let command = self.generate_sections_command(&state);
                    Transition {
                        state,
                        commands: vec![command],
                        message: format!("expanded part {} of {}", done, total),
                    }
                } else {
                    state.outline_complete = true;
                    let total = state.parts_list.len();
                    Transition {
                        state,
                        commands: Vec::new(),
                        message: format!("all {} parts expanded", total),
                    }
                }
            }

            Event::AllPartsComplete => {
                if state.status != CourseStatus::GeneratingSections || !state.outline_complete {
                    return self.unexpected(state, "AllPartsComplete");
                }
                self.check_variance(state)
            }

            Event::OutlineReviewed { outline_text } => {
                if state.status != CourseStatus::ReviewingOutline {
                    return self.unexpected(state, "OutlineReviewed");
                }
                // The review replaces the outline wholesale. Re-parse
                // best-effort so persisted sections reflect corrected
                // durations; a corrected text that fails to parse keeps
                // the previous parts rather than failing the course.
                let reparsed = parser::parse_outline(&outline_text);
                if !reparsed.is_empty() {
                    state.current_part_index = reparsed.len();
                    state.parts_list = reparsed;
                }
                state.outline_text = outline_text;
                self.storing(state, "review applied, storing course".to_string())
            }

            Event::CourseStored => {
                if state.status != CourseStatus::Storing {
                    return self.unexpected(state, "CourseStored");
                }
                state.status = CourseStatus::Complete;
                Transition {
                    state,
                    commands: Vec::new(),
                    message: "course stored".to_string(),
                }
            }

            Event::GenerationFailed { reason } => {
                if state.status.is_terminal() {
                    return self.unexpected(state, "GenerationFailed");
                }
                self.fail(state, &reason)
            }
        }
    }

    /// Variance hand-off once every part has been expanded.
    fn check_variance(&self, mut state: CourseGenerationState) -> Transition {
        let parsed_total = parser::parse_outline_total_time(&state.outline_text);
        let target = state.target_duration_minutes;

        match variance::assess(parsed_total, target, self.config.variance_threshold_pct) {
            VarianceVerdict::Unknown => self.storing(
                state,
                "outline total unknown, skipping review".to_string(),
            ),
            VarianceVerdict::WithinTolerance { variance_pct } => {
                let message = format!(
                    "outline total {} minutes within {:.1}% of target, storing",
                    parsed_total, variance_pct
                );
                self.storing(state, message)
            }
            VarianceVerdict::NeedsReview {
                variance_pct,
                current_total,
                min_acceptable,
                max_acceptable,
            } => {
                if state.review_iteration_count >= self.config.max_review_iterations {
                    return self.storing(
                        state,
                        format!(
                            "variance {:.1}% still above threshold after review, storing as-is",
                            variance_pct
                        ),
                    );
                }
                state.review_iteration_count += 1;
                state.status = CourseStatus::ReviewingOutline;
                let params = self.config.llm.review_outline;
                let mut vars = BTreeMap::new();
                vars.insert("outline".to_string(), state.outline_text.clone());
                vars.insert("target_minutes".to_string(), target.to_string());
                vars.insert("current_total".to_string(), current_total.to_string());
                vars.insert(
                    "variance_percent".to_string(),
                    format!("{:.1}", variance_pct),
                );
                vars.insert("min_acceptable".to_string(), min_acceptable.to_string());
                vars.insert("max_acceptable".to_string(), max_acceptable.to_string());
                let command = Command::InvokeLlm {
                    task: LlmTask::ReviewOutline,
                    prompt_vars: vars,
                    temperature: params.temperature,
                    max_tokens: params.max_tokens,
                };
                Transition {
                    state,
                    commands: vec![command],
                    message: format!(
                        "variance {:.1}% exceeds {:.1}%, requesting review",
                        variance_pct, self.config.variance_threshold_pct
                    ),
                }
            }
        }
    }

    fn generate_parts_command(&self, state: &CourseGenerationState) -> Command {
        let params = self.config.llm.generate_parts;
        let mut vars = BTreeMap::new();
        vars.insert("query".to_string(), state.query.clone());
        vars.insert(
            "target_minutes".to_string(),
            state.target_duration_minutes.to_string(),
        );
        vars.insert(
            "part_guidance".to_string(),
            part_count_guidance(state.target_duration_minutes).to_string(),
        );
        vars.insert(
            "sources".to_string(),
            sources_digest(&state.candidate_sources),
        );
        vars.insert("preferences".to_string(), state.preferences.describe());
        Command::InvokeLlm {
            task: LlmTask::GenerateParts,
            prompt_vars: vars,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }

    /// Builds the section-generation command for the current part,
    /// carrying the accumulated outline so each part stays consistent
    /// with the parts already expanded.
    fn generate_sections_command(&self, state: &CourseGenerationState) -> Command {
        let params = self.config.llm.generate_part_sections;
        let index = state.current_part_index;
        let (title, minutes) = state
            .parts_list
            .get(index)
            .map(|p| (p.title.clone(), p.target_minutes))
            .unwrap_or_default();
        let remaining = state.remaining_part_titles().join(", ");

        let mut vars = BTreeMap::new();
        vars.insert("query".to_string(), state.query.clone());
        vars.insert("part_number".to_string(), (index + 1).to_string());
        vars.insert("part_title".to_string(), title);
        vars.insert("part_minutes".to_string(), minutes.to_string());
        vars.insert("outline_so_far".to_string(), state.outline_text.clone());
        vars.insert("remaining_parts".to_string(), remaining);
        vars.insert("preferences".to_string(), state.preferences.describe());
        Command::InvokeLlm {
            task: LlmTask::GeneratePartSections,
            prompt_vars: vars,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }

    /// Transition into the storage phase.
    fn storing(&self, mut state: CourseGenerationState, message: String) -> Transition {
        state.status = CourseStatus::Storing;
        Transition {
            state,
            commands: vec![Command::PersistCourse, Command::PersistSections],
            message,
        }
    }

    /// Terminal failure transition.
    fn fail(&self, mut state: CourseGenerationState, reason: &str) -> Transition {
        state.status = CourseStatus::Error;
        state.error_message = Some(reason.to_string());
        Transition {
            state,
            commands: Vec::new(),
            message: reason.to_string(),
        }
    }

    /// An event arrived for the wrong phase. Never silently ignored.
    fn unexpected(&self, state: CourseGenerationState, event_name: &str) -> Transition {
        let reason = GenerationError::UnexpectedEvent {
            event: event_name.to_string(),
            status: state.status.as_str().to_string(),
        };
        self.fail(state, &reason.to_string())
    }
}

/// Digest of ranked source hits for prompt inclusion.
fn sources_digest(sources: &[SourceHit]) -> String {
    if sources.is_empty() {
        return "(no source material found; outline from the request alone)".to_string();
    }
    sources
        .iter()
        .map(|s| format!("- {}: {}", s.title, s.summary))
        .collect::<Vec<_>>()
        .join("\n")
}
