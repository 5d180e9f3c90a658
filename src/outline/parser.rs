//! Multi-strategy parsing of free-text LLM outline output.
//!
//! The model is instructed to emit "Part N: Title — X minutes" and
//! "Section N: Title — X minutes" headers, but real output drifts:
//! hyphens for em-dashes, markdown decoration, stray casing and
//! whitespace. Every parser here tolerates that drift and returns an
//! empty value instead of an error when nothing matches, so callers
//! decide whether an empty parse is tolerable or fatal.

use crate::domain::{Part, Section};
use regex::Regex;

/// Matches "Part N: Title — X minutes" headers, optionally wrapped in
/// markdown heading/bold decoration. Em-dash, en-dash, and hyphen all
/// accepted as the separator.
fn part_header_regex() -> Regex {
    Regex::new(r"(?i)^[#*\s]*part\s+(\d+)\s*:\s*(.+?)\s*[—–-]+\s*(\d+)\s*minutes?\b[\s*.]*$")
        .expect("regex to match part headers")
}

/// Matches "Section N: Title — X minutes" headers with the same
/// tolerances as part headers.
fn section_header_regex() -> Regex {
    Regex::new(r"(?i)^[#*\s]*section\s+(\d+)\s*:\s*(.+?)\s*[—–-]+\s*(\d+)\s*minutes?\b[\s*.]*$")
        .expect("regex to match section headers")
}

/// Extract the ordered part list from a parts-generation response.
///
/// Primary strategy only: part headers. Returns an empty vec when no
/// header matches, signaling the caller to fail the phase.
pub fn parse_parts_text(text: &str) -> Vec<Part> {
    let header = part_header_regex();
    let mut parts = Vec::new();

    for line in text.lines() {
        if let Some(captures) = header.captures(line) {
            let title = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let minutes = captures
                .get(3)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            if !title.is_empty() {
                parts.push(Part {
                    index: parts.len(),
                    title,
                    target_minutes: minutes,
                    sections: Vec::new(),
                });
            }
        }
    }

    parts
}

/// Extract the sections from a single part's section-generation response.
///
/// Bullet lines under a section header become its learning objectives;
/// the first plain prose line becomes the content summary.
pub fn parse_sections_text(text: &str) -> Vec<Section> {
    let part_header = part_header_regex();
    let section_header = section_header_regex();
    let total_line = Regex::new(r"(?i)^\s*total\b").expect("regex to match total lines");

    let mut sections: Vec<Section> = Vec::new();

    for line in text.lines() {
        if let Some(captures) = section_header.captures(line) {
            let title = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            let minutes = captures
                .get(3)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            if !title.is_empty() {
                sections.push(Section {
                    title,
                    learning_objectives: Vec::new(),
                    estimated_minutes: minutes,
                    content_summary: String::new(),
                });
            }
            continue;
        }

        let Some(current) = sections.last_mut() else {
            continue;
        };

        let trimmed = line.trim();
        if trimmed.is_empty()
            || part_header.is_match(line)
            || total_line.is_match(line)
            || trimmed.starts_with('#')
        {
            continue;
        }

        if trimmed.starts_with('-') || trimmed.starts_with('*') || trimmed.starts_with('•') {
            let objective = trimmed
                .trim_start_matches(['-', '*', '•', ' '].as_ref())
                .trim();
            if !objective.is_empty() {
                current.learning_objectives.push(objective.to_string());
            }
        } else if current.content_summary.is_empty() {
            current.content_summary = trimmed.to_string();
        }
    }

    sections
}

/// Re-parse a complete outline (typically the review phase's corrected
/// text) into parts with their nested sections. Section content between
/// two part headers is attributed to the earlier part.
pub fn parse_outline(text: &str) -> Vec<Part> {
    let parts = parse_parts_text(text);
    if parts.is_empty() {
        return parts;
    }

    let header = part_header_regex();
    let mut blocks: Vec<String> = Vec::new();

    for line in text.lines() {
        if header.is_match(line) {
            blocks.push(String::new());
        } else if let Some(block) = blocks.last_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }

    parts
        .into_iter()
        .map(|mut part| {
            if let Some(block) = blocks.get(part.index) {
                part.sections = parse_sections_text(block);
            }
            part
        })
        .collect()
}

/// Total planned minutes for an outline, via three ordered fallbacks:
///
/// 1. sum of all "Section N: Title — X minutes" headers;
/// 2. sum of all "Total for this part: X minutes" lines;
/// 3. a single trailing "Total: X minutes" line.
///
/// Returns 0 when no strategy matches. Callers treat 0 as "unknown".
pub fn parse_outline_total_time(text: &str) -> u32 {
    let section_header = section_header_regex();
    let section_total: u32 = text
        .lines()
        .filter_map(|line| {
            section_header
                .captures(line)
                .and_then(|c| c.get(3))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        })
        .sum();
    if section_total > 0 {
        return section_total;
    }

    let per_part = Regex::new(r"(?i)total\s+for\s+this\s+part\s*:?\s*\**\s*(\d+)\s*minutes?")
        .expect("regex to match per-part total lines");
    let part_total: u32 = per_part
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .sum();
    if part_total > 0 {
        return part_total;
    }

    let trailing = Regex::new(r"(?i)\btotal\s*:\s*\**\s*(\d+)\s*minutes?")
        .expect("regex to match trailing total lines");
    trailing
        .captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod tests;
