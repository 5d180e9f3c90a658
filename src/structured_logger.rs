//! Structured JSONL logger for debugging and pipeline reconstruction.
//!
//! Machine-parseable logging with monotonic sequence numbers, ISO 8601
//! timestamps, and the course ID for correlation. Every command the
//! driver issues, every event it reduces, and every phase change lands
//! here as one JSON line.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::state_machine::{Command, Event};

/// Structured JSONL logger for one course generation run.
pub struct GenerationLogger {
    course_id: String,
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

/// A single log entry in JSONL format.
#[derive(Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number within this process
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    /// Course ID for correlation
    pub course_id: String,
    /// Component that emitted the log
    pub component: String,
    /// Structured event data
    pub event: Value,
}

impl GenerationLogger {
    /// Creates a logger writing to `<logs_dir>/<course_id>.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the logs directory cannot be created or the
    /// log file cannot be opened.
    pub fn new(course_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join(format!("{}.jsonl", course_id));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            course_id: course_id.to_string(),
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event as a single JSON line. Thread-safe.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            course_id: self.course_id.clone(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    /// Logs a command about to be executed.
    pub fn log_command(&self, command: &Command) {
        self.log(
            "Driver",
            serde_json::json!({
                "type": "CommandIssued",
                "kind": command.kind().as_str(),
                "command": command
            }),
        );
    }

    /// Logs an event being fed to the reducer.
    pub fn log_event(&self, event: &Event) {
        self.log(
            "Reducer",
            serde_json::json!({
                "type": "EventReduced",
                "name": event.name(),
                "event": event
            }),
        );
    }

    /// Logs a phase transition.
    pub fn log_phase_transition(&self, from: &str, to: &str, message: &str) {
        self.log(
            "Reducer",
            serde_json::json!({
                "type": "PhaseTransition",
                "from": from,
                "to": to,
                "message": message
            }),
        );
    }

    /// Logs driver loop completion.
    pub fn log_run_complete(&self, status: &str, iterations: u32) {
        self.log(
            "Driver",
            serde_json::json!({
                "type": "RunComplete",
                "status": status,
                "iterations": iterations
            }),
        );
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;
