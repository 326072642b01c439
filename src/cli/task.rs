//! Task commands for Grasp.
//!
//! Intent capture and code provenance: start-task, log-chunk,
//! complete-task, record-lineage and lineage.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cli::{CommandOutput, Render};
use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::state::Mode;
use crate::core::tasks::{ChunkLogged, ChunkRequest, LineageEntry, TaskLifecycle, TaskStarted};
use crate::error::{GraspError, Result};
use crate::storage::Store;
use crate::util::read_to_string_limited;

/// Parse a `START-END` line range (a single number means one line).
pub fn parse_line_range(s: &str) -> Result<(u32, u32)> {
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| GraspError::invalid_input(format!("invalid line range: {}", s)))
    };
    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let line = parse(s)?;
            (line, line)
        }
    };
    if start > end {
        return Err(GraspError::invalid_input(format!(
            "line range {}-{} is reversed",
            start, end
        )));
    }
    Ok((start, end))
}

/// Code from `--code` or `--code-file`; exactly one must be given.
pub fn resolve_code(code: Option<String>, code_file: Option<&Path>) -> Result<String> {
    match (code, code_file) {
        (Some(code), None) => Ok(code),
        (None, Some(path)) => read_to_string_limited(path),
        (Some(_), Some(_)) => Err(GraspError::invalid_input(
            "pass either --code or --code-file, not both",
        )),
        (None, None) => Err(GraspError::invalid_input("--code or --code-file is required")),
    }
}

/// Result of completing a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCompleted {
    pub task_id: String,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of recording a chunk's location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineageRecorded {
    pub chunk_id: String,
    pub file_path: String,
    pub lines_start: u32,
    pub lines_end: u32,
}

/// Provenance of a file (or one line of it).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineageReport {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub entries: Vec<LineageEntry>,
}

impl Render for TaskStarted {
    fn render(&self) -> String {
        let mode = match self.suggested_mode {
            Mode::Guided => "guided",
            Mode::FullSpeed => "full speed",
        };
        let mut lines = vec![
            format!("Task started: {}", self.task_id),
            format!(
                "Mode: {} (average familiarity {:.0}/100)",
                mode, self.average_familiarity
            ),
        ];
        for file in &self.familiarity {
            lines.push(format!(
                "  {}: {:.0}/100 ({} interactions)",
                file.file_path, file.score, file.interactions
            ));
        }
        lines.push(String::new());
        lines.push(self.directive.clone());
        lines.join("\n")
    }
}

impl Render for ChunkLogged {
    fn render(&self) -> String {
        if self.auto_created {
            format!(
                "Chunk {} logged to auto-created task {}.\nNext time, run `grasp start-task` first.",
                self.chunk_id, self.task_id
            )
        } else {
            format!("Chunk {} logged to task {}.", self.chunk_id, self.task_id)
        }
    }
}

impl Render for TaskCompleted {
    fn render(&self) -> String {
        format!("Task {} completed.", self.task_id)
    }
}

impl Render for LineageRecorded {
    fn render(&self) -> String {
        format!(
            "Chunk {} now maps to {}:{}-{}.",
            self.chunk_id, self.file_path, self.lines_start, self.lines_end
        )
    }
}

impl Render for LineageReport {
    fn render(&self) -> String {
        let target = match self.line {
            Some(line) => format!("{}:{}", self.file_path, line),
            None => self.file_path.clone(),
        };
        if self.entries.is_empty() {
            return format!("No recorded lineage for {}.", target);
        }

        let mut lines = vec![format!("Lineage for {}:", target)];
        for entry in &self.entries {
            let range = match (entry.lines_start, entry.lines_end) {
                (Some(start), Some(end)) => format!("lines {}-{}", start, end),
                _ => "whole file".to_string(),
            };
            lines.push(format!(
                "  - {} ({}): \"{}\" [task {}, chunk {}]",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                range,
                entry.intent,
                entry.task_id,
                entry.chunk_id
            ));
        }
        lines.join("\n")
    }
}

/// The task command implementation.
pub struct TaskCommand<S: Store> {
    store: S,
    config: Config,
    clock: Box<dyn Clock>,
}

impl<S: Store> TaskCommand<S> {
    /// Create a new task command on the system clock.
    pub fn new(store: S, config: Config) -> Self {
        Self::with_clock(store, config, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, config: Config, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    fn lifecycle(&self) -> TaskLifecycle<'_, S> {
        TaskLifecycle::new(&self.store, &self.config, self.clock.as_ref())
    }

    pub fn start(&self, intent: &str, files: Vec<String>) -> CommandOutput<TaskStarted> {
        self.lifecycle().start_task(intent, files).into()
    }

    pub fn log_chunk(&self, request: ChunkRequest) -> CommandOutput<ChunkLogged> {
        self.lifecycle().log_chunk(request).into()
    }

    pub fn complete(&self, task_id: &str) -> CommandOutput<TaskCompleted> {
        self.lifecycle()
            .complete_task(task_id)
            .map(|task| TaskCompleted {
                task_id: task.id,
                completed_at: task.completed_at,
            })
            .into()
    }

    pub fn record_lineage(
        &self,
        chunk_id: &str,
        file_path: &str,
        lines: (u32, u32),
    ) -> CommandOutput<LineageRecorded> {
        self.lifecycle()
            .record_lineage(chunk_id, file_path, lines.0, lines.1)
            .map(|chunk| LineageRecorded {
                chunk_id: chunk.id,
                file_path: file_path.to_string(),
                lines_start: lines.0,
                lines_end: lines.1,
            })
            .into()
    }

    pub fn lineage(&self, file_path: &str, line: Option<u32>) -> CommandOutput<LineageReport> {
        self.lifecycle()
            .lineage(file_path, line)
            .map(|entries| LineageReport {
                file_path: file_path.to_string(),
                line,
                entries,
            })
            .into()
    }
}
