//! Design review workflow: the pre-code discussion gate.
//!
//! `not_requested -> scopes_open -> scopes_answered`. Opening a review
//! creates one `DesignReview` per scope; the last response emits a recap.

use serde::{Deserialize, Serialize};

use crate::config::{Config, DesignReviewConfig};
use crate::core::clock::Clock;
use crate::core::familiarity::{FamiliarityTracker, Interaction};
use crate::core::state::{DesignReview, ReviewScope, Task};
use crate::error::{GraspError, RecordKind, Result};
use crate::storage::queries;
use crate::storage::{Store, StoreExt};

const EXHAUSTIVE_SCOPES: &[ReviewScope] = &[
    ReviewScope::Approach,
    ReviewScope::TradeOffs,
    ReviewScope::EdgeCases,
    ReviewScope::Debugging,
];
const BROAD_SCOPES: &[ReviewScope] = &[ReviewScope::Approach, ReviewScope::EdgeCases];
const FOCUSED_SCOPES: &[ReviewScope] = &[ReviewScope::Approach];

/// Scopes to raise for a familiarity level, or `None` to skip the review.
pub fn scopes_for(familiarity: f64, config: &DesignReviewConfig) -> Option<&'static [ReviewScope]> {
    if familiarity >= config.skip_threshold {
        None
    } else if familiarity <= config.exhaustive_threshold {
        Some(EXHAUSTIVE_SCOPES)
    } else if familiarity <= config.broad_threshold {
        Some(BROAD_SCOPES)
    } else {
        Some(FOCUSED_SCOPES)
    }
}

/// One open design question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenScope {
    pub design_review_id: String,
    pub scope: ReviewScope,
    pub guidance: String,
}

/// Result of requesting a design review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewRequest {
    /// Familiarity is high enough; nothing was written.
    Skipped { familiarity: f64 },
    /// Every scope of the task's review already has an answer.
    Completed {
        task_id: String,
        entries: Vec<RecapEntry>,
    },
    Opened {
        task_id: String,
        intent: String,
        familiarity: f64,
        scopes: Vec<OpenScope>,
        instructions: String,
    },
}

/// One answered scope in a recap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecapEntry {
    pub scope: ReviewScope,
    pub response: String,
}

/// Result of recording a design response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewResponse {
    Continue {
        task_id: String,
        remaining: usize,
    },
    Recap {
        task_id: String,
        entries: Vec<RecapEntry>,
        plan_prompt: String,
    },
}

impl ReviewResponse {
    /// Human-readable rendering shown to the developer.
    pub fn render(&self) -> String {
        match self {
            Self::Continue { remaining, .. } => format!(
                "Design decision recorded. {} question{} remaining: ask the next one.",
                remaining,
                if *remaining == 1 { "" } else { "s" }
            ),
            Self::Recap {
                entries,
                plan_prompt,
                ..
            } => {
                let mut lines = vec!["Design decision recorded.".to_string(), String::new()];
                lines.push("--- DESIGN RECAP ---".to_string());
                for entry in entries {
                    lines.push(format!("{}: {}", entry.scope.as_str(), entry.response));
                }
                lines.push(String::new());
                lines.push(plan_prompt.clone());
                lines.join("\n")
            }
        }
    }
}

const OPEN_INSTRUCTIONS: &str = "Propose your approach first. Then ask ONE design question at a \
time based on the scope. STOP after each and wait for the answer. Record it with \
`grasp record-design` before asking the next.";

const PLAN_PROMPT: &str = "Show this recap to the developer verbatim. Then present an \
implementation plan as pseudocode and wait for explicit confirmation before generating any code.";

/// Drives the design review state machine for one store.
pub struct DesignReviewWorkflow<'a, S: Store + ?Sized> {
    store: &'a S,
    config: &'a Config,
    clock: &'a dyn Clock,
}

impl<'a, S: Store + ?Sized> DesignReviewWorkflow<'a, S> {
    pub fn new(store: &'a S, config: &'a Config, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Open a design review for a task.
    ///
    /// Skips without writing when the task's files are already familiar.
    pub fn request(&self, task_id: &str) -> Result<ReviewRequest> {
        let task = self
            .store
            .get::<Task>(task_id)?
            .ok_or_else(|| GraspError::not_found(RecordKind::Task, task_id))?;

        let tracker = FamiliarityTracker::new(self.store, self.clock);
        let familiarity = tracker.average(task.file_paths())?;

        let existing = queries::reviews_for_task(self.store, &task.id)?;
        if !existing.is_empty() {
            return Ok(resume(task, familiarity, existing));
        }

        let Some(scopes) = scopes_for(familiarity, &self.config.design_review) else {
            tracing::debug!(task = task_id, familiarity, "design review skipped");
            return Ok(ReviewRequest::Skipped { familiarity });
        };

        let paths = (!task.file_paths().is_empty()).then(|| task.file_paths().to_vec());
        let now = self.clock.now();
        let mut open = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let review = DesignReview::new(&task.id, *scope, paths.clone(), now);
            self.store.put(&review)?;
            open.push(OpenScope {
                design_review_id: review.id,
                scope: *scope,
                guidance: scope.guidance().to_string(),
            });
        }

        Ok(ReviewRequest::Opened {
            task_id: task.id,
            intent: task.intent,
            familiarity,
            scopes: open,
            instructions: OPEN_INSTRUCTIONS.to_string(),
        })
    }

    /// Record the developer's answer to one scope.
    pub fn record_response(&self, review_id: &str, response: &str) -> Result<ReviewResponse> {
        let mut review = self
            .store
            .get::<DesignReview>(review_id)?
            .ok_or_else(|| GraspError::not_found(RecordKind::DesignReview, review_id))?;

        let response = response.trim();
        if response.is_empty() {
            return Err(GraspError::invalid_input("response must not be empty"));
        }
        if review.is_completed() {
            return Err(GraspError::invalid_input(format!(
                "design review {} already has a response",
                review_id
            )));
        }

        review.developer_response = Some(response.to_string());
        review.responded_at = Some(self.clock.now());
        self.store.put(&review)?;

        let tracker = FamiliarityTracker::new(self.store, self.clock);
        for path in review.paths() {
            tracker.apply(path, Interaction::DesignDiscussed)?;
        }

        let reviews = queries::reviews_for_task(self.store, &review.task_id)?;
        let remaining = reviews.iter().filter(|r| !r.is_completed()).count();
        if remaining > 0 {
            return Ok(ReviewResponse::Continue {
                task_id: review.task_id,
                remaining,
            });
        }

        Ok(ReviewResponse::Recap {
            task_id: review.task_id,
            entries: recap_entries(reviews),
            plan_prompt: PLAN_PROMPT.to_string(),
        })
    }
}

/// Re-present a review that was already opened for the task.
fn resume(task: Task, familiarity: f64, reviews: Vec<DesignReview>) -> ReviewRequest {
    let open: Vec<OpenScope> = reviews
        .iter()
        .filter(|r| !r.is_completed())
        .map(|r| OpenScope {
            design_review_id: r.id.clone(),
            scope: r.scope,
            guidance: r.scope.guidance().to_string(),
        })
        .collect();

    if open.is_empty() {
        return ReviewRequest::Completed {
            task_id: task.id,
            entries: recap_entries(reviews),
        };
    }
    tracing::debug!(task = %task.id, open = open.len(), "design review resumed");
    ReviewRequest::Opened {
        task_id: task.id,
        intent: task.intent,
        familiarity,
        scopes: open,
        instructions: OPEN_INSTRUCTIONS.to_string(),
    }
}

fn recap_entries(reviews: Vec<DesignReview>) -> Vec<RecapEntry> {
    reviews
        .into_iter()
        .filter_map(|r| {
            r.developer_response.map(|response| RecapEntry {
                scope: r.scope,
                response,
            })
        })
        .collect()
}
