//! Score aggregation over the store.
//!
//! Per-task and global comprehension scores, plus the daily snapshot
//! history. The global score upserts one `ScoreRecord` per UTC day.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::core::state::{Check, Chunk, Familiarity, ScoreRecord, Task};
use crate::error::{GraspError, RecordKind, Result};
use crate::stats::scoring::{self, CheckCounts, CoverageCounts};
use crate::storage::queries;
use crate::storage::{Store, StoreExt};

/// Raw counts behind a score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawCounts {
    /// Answered or skipped checks.
    pub questions_total: usize,
    pub questions_answered: usize,
    pub questions_passed: usize,
    pub questions_skipped: usize,
    pub chunks_total: usize,
    pub files_touched: usize,
    pub files_with_context: usize,
}

/// A computed comprehension score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComprehensionScore {
    /// `task` or `overall`.
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub overall: u32,
    pub coverage: u32,
    pub engagement: u32,
    pub raw: RawCounts,
    pub message: String,
}

fn compute(chunks: &[Chunk], checks: &[Check]) -> (u32, u32, u32, RawCounts) {
    let coverage = CoverageCounts::from_chunks(chunks);
    let engagement = CheckCounts::from_checks(checks);
    let coverage_pct = coverage.percent();
    let engagement_pct = engagement.percent();

    let raw = RawCounts {
        questions_total: engagement.active,
        questions_answered: engagement.answered,
        questions_passed: engagement.passed,
        questions_skipped: engagement.skipped,
        chunks_total: chunks.len(),
        files_touched: coverage.files_touched,
        files_with_context: coverage.files_with_context,
    };
    (
        scoring::overall(coverage_pct, engagement_pct),
        coverage_pct.round() as u32,
        engagement_pct.round() as u32,
        raw,
    )
}

/// Computes scores and maintains the daily history.
pub struct ScoreAggregator<'a, S: Store + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: Store + ?Sized> ScoreAggregator<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Score one task's chunks and checks.
    pub fn task_score(&self, task_id: &str) -> Result<ComprehensionScore> {
        if !self.store.exists::<Task>(task_id)? {
            return Err(GraspError::not_found(RecordKind::Task, task_id));
        }
        let chunks = queries::chunks_for_task(self.store, task_id)?;
        let checks = queries::checks_for_task(self.store, task_id)?;
        let (overall, coverage, engagement, raw) = compute(&chunks, &checks);

        Ok(ComprehensionScore {
            scope: "task".to_string(),
            task_id: Some(task_id.to_string()),
            overall,
            coverage,
            engagement,
            raw,
            message: scoring::score_message(overall, raw.questions_total).to_string(),
        })
    }

    /// Score everything in the store.
    pub fn overall_score(&self) -> Result<ComprehensionScore> {
        let chunks = self.store.all::<Chunk>()?;
        let checks = self.store.all::<Check>()?;
        let (overall, coverage, engagement, raw) = compute(&chunks, &checks);

        Ok(ComprehensionScore {
            scope: "overall".to_string(),
            task_id: None,
            overall,
            coverage,
            engagement,
            raw,
            message: scoring::score_message(overall, raw.questions_total).to_string(),
        })
    }

    /// Upsert today's snapshot from a global score.
    ///
    /// Recording twice on the same UTC day overwrites.
    pub fn record_daily(&self, score: &ComprehensionScore) -> Result<ScoreRecord> {
        let now = self.clock.now();
        let chunks_modified = self.modified_chunk_count()?;
        let record = ScoreRecord {
            date: now.date_naive(),
            overall_score: score.overall,
            checks_passed: score.raw.questions_passed,
            checks_skipped: score.raw.questions_skipped,
            chunks_modified,
            chunks_accepted: score.raw.chunks_total.saturating_sub(chunks_modified),
            recorded_at: now,
        };
        self.store.put(&record)?;
        tracing::debug!(date = %record.date, score = record.overall_score, "daily score recorded");
        Ok(record)
    }

    /// Stored snapshots, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<ScoreRecord>> {
        let mut records = self.store.all::<ScoreRecord>()?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records.truncate(limit);
        Ok(records)
    }

    /// Chunks in files the developer has edited by hand.
    fn modified_chunk_count(&self) -> Result<usize> {
        let modified: HashMap<String, u32> = self
            .store
            .all::<Familiarity>()?
            .into_iter()
            .map(|f| (f.file_path, f.modifications))
            .collect();
        Ok(self
            .store
            .all::<Chunk>()?
            .iter()
            .filter(|c| {
                c.file_path
                    .as_ref()
                    .and_then(|p| modified.get(p))
                    .is_some_and(|n| *n > 0)
            })
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::state::{Mode, QuestionType};
    use crate::storage::MemoryStore;
    use chrono::{DateTime, Duration, NaiveDate, Utc};

    fn start() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn seed_task(store: &MemoryStore) -> Task {
        let task = Task::new("t", None, Mode::Guided, start());
        store.put(&task).unwrap();
        task
    }

    #[test]
    fn test_empty_store_scores() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let score = ScoreAggregator::new(&store, &clock).overall_score().unwrap();
        assert_eq!(score.coverage, 0);
        assert_eq!(score.engagement, 100);
        assert_eq!(score.overall, 40);
        assert!(score.message.starts_with("No comprehension data"));
    }

    #[test]
    fn test_task_score() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let task = seed_task(&store);
        let other = seed_task(&store);

        store
            .put(&Chunk::new(&task.id, "x", "explains the cache", start()).with_file(Some("a.rs".into())))
            .unwrap();
        store
            .put(&Chunk::new(&other.id, "x", "short", start()).with_file(Some("b.rs".into())))
            .unwrap();
        let mut answered = Check::new(&task.id, "q", QuestionType::EdgeCase, start());
        answered.developer_answer = Some("because".into());
        answered.score = Some(1.0);
        store.put(&answered).unwrap();
        let mut skipped = Check::new(&task.id, "q", QuestionType::EdgeCase, start());
        skipped.skipped = true;
        store.put(&skipped).unwrap();

        let score = ScoreAggregator::new(&store, &clock).task_score(&task.id).unwrap();
        assert_eq!(score.coverage, 100);
        assert_eq!(score.engagement, 50);
        assert_eq!(score.overall, 80);
        assert_eq!(score.raw.questions_total, 2);
        assert_eq!(score.raw.questions_passed, 1);
        assert!(score.message.starts_with("Strong"));
    }

    #[test]
    fn test_task_score_unknown_task() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        assert!(matches!(
            ScoreAggregator::new(&store, &clock).task_score("ghost").unwrap_err(),
            GraspError::NotFound { .. }
        ));
    }

    #[test]
    fn test_record_daily_overwrites_same_day() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let aggregator = ScoreAggregator::new(&store, &clock);

        let first = aggregator.overall_score().unwrap();
        aggregator.record_daily(&first).unwrap();

        store
            .put(&Chunk::new("t", "x", "a long enough rationale", start()).with_file(Some("a.rs".into())))
            .unwrap();
        clock.advance(Duration::hours(2));
        let second = aggregator.overall_score().unwrap();
        aggregator.record_daily(&second).unwrap();

        let history = aggregator.history(30).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].overall_score, 100);
        assert_eq!(history[0].chunks_accepted, 1);
    }

    #[test]
    fn test_record_daily_counts_modified_chunks() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        store
            .put(&Chunk::new("t", "x", "y", start()).with_file(Some("edited.rs".into())))
            .unwrap();
        store
            .put(&Chunk::new("t", "x", "y", start()).with_file(Some("kept.rs".into())))
            .unwrap();
        let mut edited = Familiarity::empty("edited.rs", start());
        edited.modifications = 2;
        store.put(&edited).unwrap();

        let aggregator = ScoreAggregator::new(&store, &clock);
        let score = aggregator.overall_score().unwrap();
        let record = aggregator.record_daily(&score).unwrap();
        assert_eq!(record.chunks_modified, 1);
        assert_eq!(record.chunks_accepted, 1);
    }

    #[test]
    fn test_history_newest_first_and_limited() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let aggregator = ScoreAggregator::new(&store, &clock);
        let score = aggregator.overall_score().unwrap();
        for _ in 0..3 {
            aggregator.record_daily(&score).unwrap();
            clock.advance(Duration::days(1));
        }

        let history = aggregator.history(2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert_eq!(history[1].date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }
}
