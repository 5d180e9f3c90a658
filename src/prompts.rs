//! Prompt builders for the course generation LLM tasks.
//!
//! Each named task renders one template from the reducer-supplied
//! prompt variables. The templates pin the exact header format the
//! outline parser expects; the parser still tolerates drift.

use crate::state_machine::LlmTask;
use std::collections::BTreeMap;

/// Renders the prompt for a named task. Missing variables render as
/// empty strings rather than failing the call.
pub fn render_prompt(task: LlmTask, vars: &BTreeMap<String, String>) -> String {
    let var = |key: &str| vars.get(key).map(String::as_str).unwrap_or("");
    match task {
        LlmTask::GenerateParts => build_generate_parts_prompt(
            var("query"),
            var("target_minutes"),
            var("part_guidance"),
            var("sources"),
            var("preferences"),
        ),
        LlmTask::GeneratePartSections => build_generate_part_sections_prompt(
            var("query"),
            var("part_number"),
            var("part_title"),
            var("part_minutes"),
            var("outline_so_far"),
            var("remaining_parts"),
            var("preferences"),
        ),
        LlmTask::ReviewOutline => build_review_outline_prompt(
            var("outline"),
            var("target_minutes"),
            var("current_total"),
            var("variance_percent"),
            var("min_acceptable"),
            var("max_acceptable"),
        ),
    }
}

fn build_generate_parts_prompt(
    query: &str,
    target_minutes: &str,
    part_guidance: &str,
    sources: &str,
    preferences: &str,
) -> String {
    format!(
        r#"You are a curriculum designer. Plan the top-level parts of a course.

######################## LEARNING REQUEST ########################
{query}
##################################################################

Target total duration: {target_minutes} minutes.
Learner preferences: {preferences}.
{part_guidance}

Source material available:
{sources}

Output one line per part, in order, using EXACTLY this format:

Part 1: <title> — <minutes> minutes

Add at most one short sentence per part after its header line. No other
headings, no preamble."#,
        query = query,
        target_minutes = target_minutes,
        preferences = preferences,
        part_guidance = part_guidance,
        sources = sources,
    )
}

fn build_generate_part_sections_prompt(
    query: &str,
    part_number: &str,
    part_title: &str,
    part_minutes: &str,
    outline_so_far: &str,
    remaining_parts: &str,
    preferences: &str,
) -> String {
    format!(
        r#"You are a curriculum designer expanding one part of a course on:
{query}

Learner preferences: {preferences}.

Course outline so far:
---
{outline_so_far}
---

Parts not yet expanded: {remaining_parts}

Now expand Part {part_number}: "{part_title}" ({part_minutes} minutes).
Output each section using EXACTLY this format:

Section 1: <title> — <minutes> minutes
- <learning objective>
- <learning objective>
<one sentence summarizing the section content>

Section minutes must sum to the part's budget. Finish with the line:

Total for this part: <minutes> minutes"#,
        query = query,
        preferences = preferences,
        outline_so_far = outline_so_far,
        remaining_parts = remaining_parts,
        part_number = part_number,
        part_title = part_title,
        part_minutes = part_minutes,
    )
}

fn build_review_outline_prompt(
    outline: &str,
    target_minutes: &str,
    current_total: &str,
    variance_percent: &str,
    min_acceptable: &str,
    max_acceptable: &str,
) -> String {
    format!(
        r#"You are reviewing a course outline whose planned time misses its target.

Target: {target_minutes} minutes. Current total: {current_total} minutes
({variance_percent}% off). Acceptable range: {min_acceptable} to
{max_acceptable} minutes.

Outline:
---
{outline}
---

Rewrite the COMPLETE outline with section durations adjusted so the
total lands inside the acceptable range. Keep the same "Part N:" and
"Section N:" header format, keep the learning objectives, and end each
part with its "Total for this part:" line. Output only the corrected
outline."#,
        target_minutes = target_minutes,
        current_total = current_total,
        variance_percent = variance_percent,
        min_acceptable = min_acceptable,
        max_acceptable = max_acceptable,
        outline = outline,
    )
}

#[cfg(test)]
#[path = "tests/prompts_tests.rs"]
mod tests;
