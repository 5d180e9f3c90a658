//! Configuration for the course generation pipeline.
//!
//! One explicit configuration object, loaded from YAML with serde
//! defaults, injected into the reducer, executor, and driver at
//! construction. There are no process-wide singletons.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration: pipeline tuning plus the
/// wiring for the reference collaborators.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// JSONL corpus of pre-embedded source summaries. Defaults to
    /// `<data_dir>/sources.jsonl`.
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    /// Root directory for state, courses, and logs. Defaults to
    /// `~/.course-agent`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Loads configuration from a YAML file, or returns defaults when
    /// no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Tuning for the generation pipeline itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    #[serde(default)]
    pub search: SearchConfig,
    /// Variance above this percentage triggers the review phase.
    #[serde(default = "default_variance_threshold_pct")]
    pub variance_threshold_pct: f64,
    /// Maximum review passes per course.
    #[serde(default = "default_max_review_iterations")]
    pub max_review_iterations: u32,
    /// Driver loop cap; exceeding it is a fatal error.
    #[serde(default = "default_max_driver_iterations")]
    pub max_driver_iterations: u32,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-call collaborator timeout.
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
    /// State records expire this many days after creation, regardless
    /// of terminal status.
    #[serde(default = "default_state_ttl_days")]
    pub state_ttl_days: u32,
    #[serde(default)]
    pub llm: LlmTaskParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            variance_threshold_pct: default_variance_threshold_pct(),
            max_review_iterations: default_max_review_iterations(),
            max_driver_iterations: default_max_driver_iterations(),
            retry: RetryConfig::default(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
            state_ttl_days: default_state_ttl_days(),
            llm: LlmTaskParams::default(),
        }
    }
}

impl GenerationConfig {
    /// State record TTL in seconds.
    pub fn state_ttl_seconds(&self) -> i64 {
        i64::from(self.state_ttl_days) * 24 * 60 * 60
    }
}

/// Similarity search parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

/// Bounded exponential backoff for retryable collaborator failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Sampling parameters for one LLM task.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Per-task LLM parameters. Review runs cooler than generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmTaskParams {
    #[serde(default = "default_generate_parts_params")]
    pub generate_parts: LlmParams,
    #[serde(default = "default_generate_part_sections_params")]
    pub generate_part_sections: LlmParams,
    #[serde(default = "default_review_outline_params")]
    pub review_outline: LlmParams,
}

impl Default for LlmTaskParams {
    fn default() -> Self {
        Self {
            generate_parts: default_generate_parts_params(),
            generate_part_sections: default_generate_part_sections_params(),
            review_outline: default_review_outline_params(),
        }
    }
}

/// Command to spawn for the language model collaborator. The prompt is
/// written to the child's stdin and the completion read from stdout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default = "default_model_command")]
    pub command: String,
    #[serde(default = "default_model_args")]
    pub args: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: default_model_command(),
            args: default_model_args(),
        }
    }
}

/// Embedding parameters for the feature-hash embedder.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_embedding_dimension(),
        }
    }
}

fn default_variance_threshold_pct() -> f64 {
    5.0
}

fn default_max_review_iterations() -> u32 {
    1
}

fn default_max_driver_iterations() -> u32 {
    20
}

fn default_collaborator_timeout_secs() -> u64 {
    120
}

fn default_state_ttl_days() -> u32 {
    7
}

fn default_top_k() -> usize {
    10
}

fn default_min_similarity() -> f32 {
    0.2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_generate_parts_params() -> LlmParams {
    LlmParams {
        temperature: 0.7,
        max_tokens: 2_000,
    }
}

fn default_generate_part_sections_params() -> LlmParams {
    LlmParams {
        temperature: 0.7,
        max_tokens: 3_000,
    }
}

fn default_review_outline_params() -> LlmParams {
    LlmParams {
        temperature: 0.3,
        max_tokens: 4_000,
    }
}

fn default_model_command() -> String {
    "claude".to_string()
}

fn default_model_args() -> Vec<String> {
    vec!["-p".to_string()]
}

fn default_embedding_dimension() -> usize {
    256
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
