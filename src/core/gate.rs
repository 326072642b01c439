//! Gate state machine for Grasp.
//!
//! Computes allow/deny/nudge verdicts for intercepted tool-use events. The
//! gate is stateless between calls: everything it knows comes from the store.
//! The host editor is the actual enforcement point.

use crate::config::{Config, HooksConfig};
use crate::core::clock::Clock;
use crate::core::design::scopes_for;
use crate::core::familiarity::{FamiliarityTracker, Interaction};
use crate::core::state::{Mode, Task};
use crate::error::Result;
use crate::storage::queries;
use crate::storage::Store;
use crate::util::relative_time;

/// When a hook fired relative to the tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreToolUse,
    PostToolUse,
}

impl HookPhase {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PreToolUse" | "pre-tool-use" | "pre_tool_use" | "pretooluse" => Some(Self::PreToolUse),
            "PostToolUse" | "post-tool-use" | "post_tool_use" | "posttooluse" => {
                Some(Self::PostToolUse)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
        }
    }
}

/// A tool-use event the gate has an opinion on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEvent {
    PreWrite { file_path: Option<String> },
    PostWrite { file_path: Option<String> },
    PostRead { file_path: Option<String> },
}

impl ToolEvent {
    /// Classify a raw hook event. Unknown tools and pre-read events yield `None`.
    pub fn classify(
        phase: HookPhase,
        tool_name: &str,
        file_path: Option<String>,
        hooks: &HooksConfig,
    ) -> Option<Self> {
        match phase {
            HookPhase::PreToolUse if hooks.is_write_tool(tool_name) => {
                Some(Self::PreWrite { file_path })
            }
            HookPhase::PostToolUse if hooks.is_write_tool(tool_name) => {
                Some(Self::PostWrite { file_path })
            }
            HookPhase::PostToolUse if hooks.is_read_tool(tool_name) => {
                Some(Self::PostRead { file_path })
            }
            _ => None,
        }
    }
}

/// The gate's decision for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    AllowSilent,
    /// Non-blocking: the message is shown to the agent.
    AllowWithContext(String),
    /// Blocking: the action should not proceed.
    Deny(String),
}

impl GateVerdict {
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

/// Gate evaluator over a store.
pub struct Gate<'a, S: Store + ?Sized> {
    store: &'a S,
    config: &'a Config,
    clock: &'a dyn Clock,
}

impl<'a, S: Store + ?Sized> Gate<'a, S> {
    pub fn new(store: &'a S, config: &'a Config, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Evaluate one event.
    pub fn evaluate(&self, event: &ToolEvent) -> Result<GateVerdict> {
        match event {
            ToolEvent::PreWrite { .. } => self.pre_write(),
            ToolEvent::PostWrite { file_path } => self.post_write(file_path.as_deref()),
            ToolEvent::PostRead { file_path } => self.post_read(file_path.as_deref()),
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn pre_write(&self) -> Result<GateVerdict> {
        let now = self.clock.now();
        let Some(task) =
            queries::most_recent_task(self.store, now, self.config.tasks.recency_window())?
        else {
            return Ok(GateVerdict::AllowWithContext(start_task_reminder()));
        };

        let reviews = queries::reviews_for_task(self.store, &task.id)?;
        let completed_reviews = reviews.iter().filter(|r| r.is_completed()).count();

        if task.mode == Mode::Guided && completed_reviews == 0 && self.review_required(&task)? {
            tracing::debug!(task = %task.id, "write denied: design review outstanding");
            return Ok(GateVerdict::Deny(design_review_required(&task)));
        }

        if reviews.is_empty()
            && !queries::chunks_for_task(self.store, &task.id)?.is_empty()
            && queries::checks_for_task(self.store, &task.id)?.is_empty()
        {
            return Ok(GateVerdict::AllowWithContext(check_reminder(&task)));
        }

        Ok(GateVerdict::AllowSilent)
    }

    /// Whether a design review for the task would raise any scope.
    fn review_required(&self, task: &Task) -> Result<bool> {
        let familiarity =
            FamiliarityTracker::new(self.store, self.clock).average(task.file_paths())?;
        Ok(scopes_for(familiarity, &self.config.design_review).is_some())
    }

    fn post_write(&self, file_path: Option<&str>) -> Result<GateVerdict> {
        let Some(path) = file_path else {
            return Ok(GateVerdict::AllowSilent);
        };
        if queries::has_chunks_for_file(self.store, path)? {
            FamiliarityTracker::new(self.store, self.clock).apply(path, Interaction::Modified)?;
        }
        Ok(GateVerdict::AllowSilent)
    }

    fn post_read(&self, file_path: Option<&str>) -> Result<GateVerdict> {
        let Some(path) = file_path else {
            return Ok(GateVerdict::AllowSilent);
        };
        let chunks = queries::chunks_for_file(self.store, path)?;
        if chunks.is_empty() {
            return Ok(GateVerdict::AllowSilent);
        }

        let now = self.clock.now();
        let mut lines = vec![format!("Grasp context for {}:", path)];
        for chunk in &chunks {
            lines.push(format!(
                "- [{}] {}",
                relative_time(chunk.created_at, now),
                chunk.explanation
            ));
        }
        Ok(GateVerdict::AllowWithContext(lines.join("\n")))
    }
}

fn start_task_reminder() -> String {
    "Reminder: run `grasp start-task` before generating code to capture intent and enable \
     comprehension tracking."
        .to_string()
}

fn design_review_required(task: &Task) -> String {
    format!(
        "Task {} (\"{}\") is in guided mode and has no completed design review. Run \
         `grasp design-review {}` and discuss the design with the developer before writing code.",
        task.id, task.intent, task.id
    )
}

fn check_reminder(task: &Task) -> String {
    format!(
        "Task {} has generated code without comprehension checks. Once the code is written, run \
         `grasp check {}` to verify the developer understands it.",
        task.id, task.id
    )
}
