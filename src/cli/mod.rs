//! CLI commands for Grasp.
//!
//! Commands are organized into:
//! - **Task commands**: start-task, log-chunk, complete-task, record-lineage, lineage
//! - **Gate commands**: design-review, record-design, check, record-answer
//! - **User commands**: score, history, why, context
//! - **Hook command**: hook (host editor integration, see `hooks`)
//!
//! Every command returns a [`CommandOutput`] rendered either as JSON or as
//! text written for the agent relaying it to the developer.

pub mod check;
pub mod design;
pub mod lookup;
pub mod score;
pub mod task;

use serde::Serialize;

use crate::error::Result;

pub use check::CheckCommand;
pub use design::DesignCommand;
pub use lookup::LookupCommand;
pub use score::ScoreCommand;
pub use task::TaskCommand;

/// Output options shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Text rendering of a command result.
pub trait Render {
    fn render(&self) -> String;
}

/// Output envelope for every command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    #[serde(flatten)]
    pub result: Option<T>,
    /// Error message if the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> CommandOutput<T> {
    /// Create a successful output.
    pub fn success(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<Result<T>> for CommandOutput<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => {
                if err.is_caller_error() {
                    tracing::debug!(error = %err, "command rejected");
                } else {
                    tracing::warn!(error = %err, "command failed");
                }
                Self::failure(err.to_string())
            }
        }
    }
}

impl<T: Serialize + Render> CommandOutput<T> {
    /// Format output based on options.
    pub fn format(&self, options: &OutputOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
        } else {
            match (&self.result, &self.error) {
                (Some(result), _) => result.render(),
                (None, error) => format!("Error: {}", error.as_deref().unwrap_or("unknown error")),
            }
        }
    }
}
