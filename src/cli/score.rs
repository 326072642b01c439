//! Score commands for Grasp.
//!
//! `score` reports comprehension for one task or the whole store; the global
//! form also records today's snapshot. `history` lists those snapshots.

use serde::{Deserialize, Serialize};

use crate::cli::{CommandOutput, Render};
use crate::core::clock::{Clock, SystemClock};
use crate::core::state::ScoreRecord;
use crate::error::FailOpen;
use crate::stats::{ComprehensionScore, ScoreAggregator};
use crate::storage::Store;

/// Default number of history rows.
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

/// Stored daily snapshots, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreHistory {
    pub records: Vec<ScoreRecord>,
}

impl Render for ComprehensionScore {
    fn render(&self) -> String {
        let title = match &self.task_id {
            Some(task_id) => format!("Comprehension score for task {}", task_id),
            None => "Comprehension score (overall)".to_string(),
        };
        [
            format!("{}: {}/100", title, self.overall),
            format!(
                "  Coverage:   {}% ({} of {} AI-touched files explained)",
                self.coverage, self.raw.files_with_context, self.raw.files_touched
            ),
            format!(
                "  Engagement: {}% ({} answered, {} skipped, {} passed)",
                self.engagement,
                self.raw.questions_answered,
                self.raw.questions_skipped,
                self.raw.questions_passed
            ),
            format!("  Chunks:     {}", self.raw.chunks_total),
            String::new(),
            self.message.clone(),
        ]
        .join("\n")
    }
}

impl Render for ScoreHistory {
    fn render(&self) -> String {
        if self.records.is_empty() {
            return "No score history yet. Run `grasp score` to record today's snapshot."
                .to_string();
        }
        let mut lines = vec![format!(
            "{:<10}  {:>5}  {:>6}  {:>7}  {:>8}  {:>8}",
            "Date", "Score", "Passed", "Skipped", "Modified", "Accepted"
        )];
        for record in &self.records {
            lines.push(format!(
                "{:<10}  {:>5}  {:>6}  {:>7}  {:>8}  {:>8}",
                record.date.format("%Y-%m-%d"),
                record.overall_score,
                record.checks_passed,
                record.checks_skipped,
                record.chunks_modified,
                record.chunks_accepted
            ));
        }
        lines.join("\n")
    }
}

/// The score command implementation.
pub struct ScoreCommand<S: Store> {
    store: S,
    clock: Box<dyn Clock>,
}

impl<S: Store> ScoreCommand<S> {
    /// Create a new score command on the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Box<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn aggregator(&self) -> ScoreAggregator<'_, S> {
        ScoreAggregator::new(&self.store, self.clock.as_ref())
    }

    /// Score one task, or everything when `task_id` is `None`.
    pub fn score(&self, task_id: Option<&str>) -> CommandOutput<ComprehensionScore> {
        let aggregator = self.aggregator();
        match task_id {
            Some(task_id) => aggregator.task_score(task_id).into(),
            None => {
                let result = aggregator.overall_score();
                if let Ok(score) = &result {
                    aggregator
                        .record_daily(score)
                        .map(|_| ())
                        .fail_open_default("recording daily score");
                }
                result.into()
            }
        }
    }

    pub fn history(&self, limit: usize) -> CommandOutput<ScoreHistory> {
        self.aggregator()
            .history(limit)
            .map(|records| ScoreHistory { records })
            .into()
    }
}
