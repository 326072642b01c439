//! Task and chunk lifecycle.
//!
//! Tasks are created explicitly by the agent or implicitly when a chunk is
//! logged without one. Mode is fixed at creation from the average
//! familiarity of the declared files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::clock::Clock;
use crate::core::familiarity::{FamiliarityTracker, FileFamiliarity, Interaction};
use crate::core::state::{Chunk, Mode, Task};
use crate::error::{GraspError, RecordKind, Result};
use crate::storage::queries;
use crate::storage::{Store, StoreExt};

/// Result of starting a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStarted {
    pub task_id: String,
    pub suggested_mode: Mode,
    pub average_familiarity: f64,
    pub familiarity: Vec<FileFamiliarity>,
    /// Next-step instructions for the agent.
    pub directive: String,
}

/// A code block to log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    pub code: String,
    pub explanation: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub lines: Option<(u32, u32)>,
}

/// Result of logging a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkLogged {
    pub chunk_id: String,
    pub task_id: String,
    pub auto_created: bool,
}

/// One chunk's provenance for a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineageEntry {
    pub task_id: String,
    pub chunk_id: String,
    pub file_path: String,
    pub lines_start: Option<u32>,
    pub lines_end: Option<u32>,
    pub intent: String,
    pub created_at: DateTime<Utc>,
}

/// Creates and completes tasks, logs chunks, tracks lineage.
pub struct TaskLifecycle<'a, S: Store + ?Sized> {
    store: &'a S,
    config: &'a Config,
    clock: &'a dyn Clock,
}

impl<'a, S: Store + ?Sized> TaskLifecycle<'a, S> {
    pub fn new(store: &'a S, config: &'a Config, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    fn tracker(&self) -> FamiliarityTracker<'a, S> {
        FamiliarityTracker::new(self.store, self.clock)
    }

    /// Mode for a set of files: full speed only strictly above the threshold.
    pub fn mode_for(&self, average_familiarity: f64) -> Mode {
        if average_familiarity > self.config.tasks.full_speed_threshold {
            Mode::FullSpeed
        } else {
            Mode::Guided
        }
    }

    fn create_task(&self, intent: String, files: Option<Vec<String>>) -> Result<Task> {
        let paths = files.clone().unwrap_or_default();
        let average = self.tracker().average(&paths)?;
        let task = Task::new(intent, files, self.mode_for(average), self.clock.now());
        self.store.put(&task)?;
        tracing::debug!(task = %task.id, mode = task.mode.as_str(), average, "task created");
        Ok(task)
    }

    /// Declare intent and get a suggested mode.
    pub fn start_task(&self, intent: &str, files: Vec<String>) -> Result<TaskStarted> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(GraspError::invalid_input("intent must not be empty"));
        }

        let files = (!files.is_empty()).then_some(files);
        let task = self.create_task(intent.to_string(), files)?;

        let tracker = self.tracker();
        let average = tracker.average(task.file_paths())?;
        let familiarity = tracker.snapshot(task.file_paths())?;

        Ok(TaskStarted {
            directive: directive(&task),
            task_id: task.id,
            suggested_mode: task.mode,
            average_familiarity: average,
            familiarity,
        })
    }

    /// Look up a task, failing with `NotFound`.
    pub fn require_task(&self, task_id: &str) -> Result<Task> {
        self.store
            .get::<Task>(task_id)?
            .ok_or_else(|| GraspError::not_found(RecordKind::Task, task_id))
    }

    /// Log one block of generated code.
    ///
    /// Without a task id a task is synthesized from the file path. With an
    /// unknown task id nothing is written.
    pub fn log_chunk(&self, request: ChunkRequest) -> Result<ChunkLogged> {
        if let Some((start, end)) = request.lines {
            if start > end {
                return Err(GraspError::invalid_input(format!(
                    "line range {}-{} is reversed",
                    start, end
                )));
            }
        }
        let file_path = request.file_path.filter(|p| !p.trim().is_empty());

        let (task, auto_created) = match request.task_id {
            Some(task_id) => (self.require_task(&task_id)?, false),
            None => {
                let intent = match &file_path {
                    Some(path) => format!("Auto-captured: changes to {}", path),
                    None => "Auto-captured: code generation".to_string(),
                };
                (self.create_task(intent, file_path.clone().map(|p| vec![p]))?, true)
            }
        };

        let chunk = Chunk::new(&task.id, request.code, request.explanation, self.clock.now())
            .with_file(file_path.clone())
            .with_lines(request.lines);
        self.store.put(&chunk)?;

        if let Some(path) = &file_path {
            self.tracker().apply(path, Interaction::Generated)?;
        }

        Ok(ChunkLogged {
            chunk_id: chunk.id,
            task_id: task.id,
            auto_created,
        })
    }

    /// Mark a task complete. Completing twice keeps the first timestamp.
    pub fn complete_task(&self, task_id: &str) -> Result<Task> {
        let mut task = self.require_task(task_id)?;
        if task.completed_at.is_none() {
            task.completed_at = Some(self.clock.now());
            self.store.put(&task)?;
            tracing::debug!(task = %task.id, "task completed");
        }
        Ok(task)
    }

    /// Complete the task if it has checks and none are still pending.
    ///
    /// Returns whether the task is complete afterwards.
    pub fn complete_if_resolved(&self, task_id: &str) -> Result<bool> {
        let task = self.require_task(task_id)?;
        if task.is_completed() {
            return Ok(true);
        }
        let checks = queries::checks_for_task(self.store, task_id)?;
        if checks.is_empty() || checks.iter().any(|c| c.is_pending()) {
            return Ok(false);
        }
        self.complete_task(task_id)?;
        Ok(true)
    }

    /// The most recently started task inside the configured recency window.
    pub fn current_task(&self) -> Result<Option<Task>> {
        queries::most_recent_task(
            self.store,
            self.clock.now(),
            self.config.tasks.recency_window(),
        )
    }

    /// Attach a file location to a chunk.
    pub fn record_lineage(
        &self,
        chunk_id: &str,
        file_path: &str,
        lines_start: u32,
        lines_end: u32,
    ) -> Result<Chunk> {
        if file_path.trim().is_empty() {
            return Err(GraspError::invalid_input("file_path must not be empty"));
        }
        if lines_start > lines_end {
            return Err(GraspError::invalid_input(format!(
                "line range {}-{} is reversed",
                lines_start, lines_end
            )));
        }
        let mut chunk = self
            .store
            .get::<Chunk>(chunk_id)?
            .ok_or_else(|| GraspError::not_found(RecordKind::Chunk, chunk_id))?;

        chunk.file_path = Some(file_path.to_string());
        chunk.lines_start = Some(lines_start);
        chunk.lines_end = Some(lines_end);
        self.store.put(&chunk)?;
        Ok(chunk)
    }

    /// Which tasks produced the code in a file, newest first.
    ///
    /// With `line`, only chunks whose recorded range covers it.
    pub fn lineage(&self, file_path: &str, line: Option<u32>) -> Result<Vec<LineageEntry>> {
        let chunks = queries::chunks_for_file(self.store, file_path)?;
        let mut entries = Vec::new();
        for chunk in chunks {
            if let Some(line) = line {
                if !chunk.covers_line(line) {
                    continue;
                }
            }
            let Some(task) = self.store.get::<Task>(&chunk.task_id)? else {
                continue;
            };
            entries.push(LineageEntry {
                task_id: task.id,
                chunk_id: chunk.id,
                file_path: file_path.to_string(),
                lines_start: chunk.lines_start,
                lines_end: chunk.lines_end,
                intent: task.intent,
                created_at: chunk.created_at,
            });
        }
        Ok(entries)
    }
}

/// Next-step instructions for a freshly started task.
fn directive(task: &Task) -> String {
    match task.mode {
        Mode::Guided => [
            "--- MANDATORY NEXT STEP ---".to_string(),
            format!(
                "You MUST run `grasp design-review {}` BEFORE writing any code.",
                task.id
            ),
            "Do NOT start generating code until the design review is complete.".to_string(),
            "After the design review, log every code block with `grasp log-chunk`.".to_string(),
            format!(
                "After all code is written, run `grasp check {}` for comprehension questions.",
                task.id
            ),
        ]
        .join("\n"),
        Mode::FullSpeed => [
            "--- WORKFLOW REMINDER ---".to_string(),
            "Log every code block with `grasp log-chunk`.".to_string(),
            format!(
                "After all code is written, run `grasp check {}` to verify comprehension.",
                task.id
            ),
        ]
        .join("\n"),
    }
}
