//! Design review commands for Grasp.
//!
//! `design-review` opens the pre-code questions for a task and
//! `record-design` stores the developer's answer to one of them.

use crate::cli::{CommandOutput, Render};
use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::design::{DesignReviewWorkflow, ReviewRequest, ReviewResponse};
use crate::storage::Store;

impl Render for ReviewRequest {
    fn render(&self) -> String {
        match self {
            Self::Skipped { familiarity } => format!(
                "Developer familiarity is {:.0}/100. Design review skipped: proceed with \
                 generation and log chunks as you go.",
                familiarity
            ),
            Self::Completed { task_id, entries } => {
                let mut lines = vec![format!(
                    "Design review for task {} is complete. Recorded decisions:",
                    task_id
                )];
                for entry in entries {
                    lines.push(format!("{}: {}", entry.scope.as_str(), entry.response));
                }
                lines.join("\n")
            }
            Self::Opened {
                task_id,
                intent,
                familiarity,
                scopes,
                instructions,
            } => {
                let mut lines = vec![
                    format!("--- DESIGN REVIEW: {} ---", intent),
                    format!("Task: {}", task_id),
                    format!("Familiarity: {:.0}/100", familiarity),
                    String::new(),
                ];
                for (i, open) in scopes.iter().enumerate() {
                    lines.push(format!(
                        "{}. [{}] {}",
                        i + 1,
                        open.scope.as_str(),
                        open.design_review_id
                    ));
                    lines.push(format!("   {}", open.guidance));
                }
                lines.push(String::new());
                lines.push(instructions.clone());
                lines.join("\n")
            }
        }
    }
}

impl Render for ReviewResponse {
    fn render(&self) -> String {
        ReviewResponse::render(self)
    }
}

/// The design review command implementation.
pub struct DesignCommand<S: Store> {
    store: S,
    config: Config,
    clock: Box<dyn Clock>,
}

impl<S: Store> DesignCommand<S> {
    /// Create a new design command on the system clock.
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

    fn workflow(&self) -> DesignReviewWorkflow<'_, S> {
        DesignReviewWorkflow::new(&self.store, &self.config, self.clock.as_ref())
    }

    pub fn review(&self, task_id: &str) -> CommandOutput<ReviewRequest> {
        self.workflow().request(task_id).into()
    }

    pub fn record(&self, review_id: &str, response: &str) -> CommandOutput<ReviewResponse> {
        self.workflow().record_response(review_id, response).into()
    }
}
