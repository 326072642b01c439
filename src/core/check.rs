//! Comprehension check workflow: the post-code quiz gate.
//!
//! A check is created as a placeholder and finalized by exactly one answer
//! or skip. Tasks that already had a design review are never quizzed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{CheckConfig, Config};
use crate::core::clock::Clock;
use crate::core::familiarity::{FamiliarityTracker, Interaction};
use crate::core::questions::QuestionGenerator;
use crate::core::state::{AnswerQuality, Check, Chunk, QuestionType, Task};
use crate::core::tasks::TaskLifecycle;
use crate::error::{GraspError, RecordKind, Result};
use crate::storage::queries;
use crate::storage::{Store, StoreExt};

/// Answers scoring above this count as correct.
pub const PASS_SCORE: f64 = 0.5;

/// Answers longer than this score full marks when no quality is given.
pub const SUBSTANTIVE_ANSWER_LEN: usize = 20;

/// Score for a caller-graded answer.
pub fn quality_score(quality: AnswerQuality) -> f64 {
    match quality {
        AnswerQuality::Correct => 1.0,
        AnswerQuality::Partial => 0.6,
        AnswerQuality::Incorrect => 0.2,
        AnswerQuality::NeedsExplanation => 0.1,
    }
}

/// Score for an ungraded answer, by length.
pub fn length_score(answer: &str) -> f64 {
    if answer.chars().count() > SUBSTANTIVE_ANSWER_LEN {
        1.0
    } else {
        0.5
    }
}

/// How many questions to ask, or `None` to skip.
pub fn question_count(chunk_count: usize, familiarity: f64, config: &CheckConfig) -> Option<usize> {
    if familiarity >= config.skip_threshold || chunk_count == 0 {
        return None;
    }
    let base = chunk_count.min(config.max_questions);
    let count = if familiarity > config.reduced_threshold {
        base.div_ceil(2)
    } else {
        base
    };
    Some(count.max(1))
}

/// A chunk's rationale surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkSummary {
    pub chunk_id: String,
    pub file_path: Option<String>,
    pub explanation: String,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            file_path: chunk.file_path.clone(),
            explanation: chunk.explanation.clone(),
        }
    }
}

/// A created check paired with its source material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenCheck {
    pub check_id: String,
    pub question: String,
    pub question_type: QuestionType,
    pub chunk: ChunkSummary,
}

/// Result of requesting a comprehension check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckRequest {
    /// The task had a completed design review.
    AlreadyReviewed,
    NothingToCheck,
    /// Familiarity is high; explanations are returned as a walkthrough.
    HighFamiliarity {
        familiarity: f64,
        walkthrough: Vec<ChunkSummary>,
    },
    Questions {
        task_id: String,
        intent: String,
        familiarity: f64,
        checks: Vec<OpenCheck>,
        instructions: String,
    },
}

impl CheckRequest {
    /// Whether any checks were created.
    pub fn created(&self) -> usize {
        match self {
            Self::Questions { checks, .. } => checks.len(),
            _ => 0,
        }
    }
}

/// Result of recording an answer or skip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecorded {
    pub check_id: String,
    pub skipped: bool,
    pub score: Option<f64>,
    pub task_completed: bool,
    pub message: String,
}

const QUESTION_INSTRUCTIONS: &str = "Ask ONE question per turn, phrased from the chunk's \
explanation. Wait for the developer's answer, then record it with `grasp record-answer` before \
asking the next.";

const SKIP_MESSAGE: &str = "Question skipped. That's fine: skips are tracked, not penalized harshly.";
const PASS_MESSAGE: &str = "Answer recorded. The developer engaged with the code.";
const REVIEW_MESSAGE: &str =
    "Answer recorded. Walk the developer through the parts they were unsure about.";

/// Drives the comprehension check state machine for one store.
pub struct CheckWorkflow<'a, S: Store + ?Sized> {
    store: &'a S,
    config: &'a Config,
    clock: &'a dyn Clock,
    questions: &'a QuestionGenerator,
}

impl<'a, S: Store + ?Sized> CheckWorkflow<'a, S> {
    pub fn new(
        store: &'a S,
        config: &'a Config,
        clock: &'a dyn Clock,
        questions: &'a QuestionGenerator,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            questions,
        }
    }

    /// Create comprehension checks for a task's chunks.
    ///
    /// `chunk_ids` restricts the selection; unknown ids are ignored.
    pub fn request(&self, task_id: &str, chunk_ids: Option<&[String]>) -> Result<CheckRequest> {
        let task = self
            .store
            .get::<Task>(task_id)?
            .ok_or_else(|| GraspError::not_found(RecordKind::Task, task_id))?;

        if queries::completed_review_count(self.store, task_id)? > 0 {
            tracing::debug!(task = task_id, "check skipped: design already reviewed");
            return Ok(CheckRequest::AlreadyReviewed);
        }

        let chunks: Vec<Chunk> = queries::chunks_for_task(self.store, task_id)?
            .into_iter()
            .filter(|c| chunk_ids.is_none_or(|ids| ids.contains(&c.id)))
            .collect();
        if chunks.is_empty() {
            return Ok(CheckRequest::NothingToCheck);
        }

        let paths: Vec<String> = chunks
            .iter()
            .filter_map(|c| c.file_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let tracker = FamiliarityTracker::new(self.store, self.clock);
        let familiarity = tracker.average(&paths)?;

        let Some(count) = question_count(chunks.len(), familiarity, &self.config.checks) else {
            return Ok(CheckRequest::HighFamiliarity {
                familiarity,
                walkthrough: chunks.iter().map(ChunkSummary::from).collect(),
            });
        };

        let slots: Vec<&Chunk> = chunks.iter().cycle().take(count).collect();
        let generated = self.questions.generate(&slots, &task.intent, familiarity);

        let now = self.clock.now();
        let mut open = Vec::with_capacity(generated.len());
        for (question, chunk) in generated.into_iter().zip(slots) {
            let check = Check::new(&task.id, question.question, question.question_type, now)
                .with_chunk(&chunk.id)
                .with_expected_insight(question.expected_insight);
            self.store.put(&check)?;
            open.push(OpenCheck {
                check_id: check.id,
                question: check.question,
                question_type: check.question_type,
                chunk: ChunkSummary::from(chunk),
            });
        }

        Ok(CheckRequest::Questions {
            task_id: task.id,
            intent: task.intent,
            familiarity,
            checks: open,
            instructions: QUESTION_INSTRUCTIONS.to_string(),
        })
    }

    /// Finalize a check with an answer or a skip.
    pub fn record_answer(
        &self,
        check_id: &str,
        answer: Option<&str>,
        skipped: bool,
        quality: Option<AnswerQuality>,
    ) -> Result<AnswerRecorded> {
        let mut check = self
            .store
            .get::<Check>(check_id)?
            .ok_or_else(|| GraspError::not_found(RecordKind::Check, check_id))?;

        if !check.is_pending() {
            return Err(GraspError::invalid_input(format!(
                "check {} was already {}",
                check_id,
                if check.skipped { "skipped" } else { "answered" }
            )));
        }

        let answer = answer.map(str::trim).filter(|a| !a.is_empty());
        let (interaction, message) = if skipped {
            check.skipped = true;
            (Interaction::Skipped, SKIP_MESSAGE)
        } else {
            let Some(answer) = answer else {
                return Err(GraspError::invalid_input(
                    "provide an answer or mark the question skipped",
                ));
            };
            let score = quality.map(quality_score).unwrap_or_else(|| length_score(answer));
            check.developer_answer = Some(answer.to_string());
            check.score = Some(score);
            if score > PASS_SCORE {
                (Interaction::AnsweredCorrectly, PASS_MESSAGE)
            } else {
                (Interaction::AnsweredIncorrectly, REVIEW_MESSAGE)
            }
        };
        check.resolved_at = Some(self.clock.now());
        self.store.put(&check)?;

        if let Some(path) = self.file_for(&check)? {
            FamiliarityTracker::new(self.store, self.clock).apply(&path, interaction)?;
        }

        let lifecycle = TaskLifecycle::new(self.store, self.config, self.clock);
        let task_completed = match lifecycle.complete_if_resolved(&check.task_id) {
            Ok(done) => done,
            Err(GraspError::NotFound { .. }) => false,
            Err(err) => return Err(err),
        };

        Ok(AnswerRecorded {
            check_id: check.id,
            skipped: check.skipped,
            score: check.score,
            task_completed,
            message: message.to_string(),
        })
    }

    fn file_for(&self, check: &Check) -> Result<Option<String>> {
        let Some(chunk_id) = &check.chunk_id else {
            return Ok(None);
        };
        Ok(self
            .store
            .get::<Chunk>(chunk_id)?
            .and_then(|chunk| chunk.file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::design::{DesignReviewWorkflow, ReviewRequest, ReviewResponse};
    use crate::core::familiarity::deltas;
    use crate::core::tasks::{ChunkRequest, TaskLifecycle};
    use crate::core::state::{DesignReview, Familiarity, Mode, ReviewScope, PENDING_QUESTION};
    use crate::storage::MemoryStore;
    use chrono::{DateTime, Utc};

    fn start() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    struct Fixture {
        store: MemoryStore,
        config: Config,
        clock: FixedClock,
        questions: QuestionGenerator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                config: Config::default(),
                clock: FixedClock::new(start()),
                questions: QuestionGenerator::agent(),
            }
        }

        fn workflow(&self) -> CheckWorkflow<'_, MemoryStore> {
            CheckWorkflow::new(&self.store, &self.config, &self.clock, &self.questions)
        }

        fn task(&self) -> Task {
            let task = Task::new("add retries", None, Mode::Guided, start());
            self.store.put(&task).unwrap();
            task
        }

        fn chunk(&self, task: &Task, file: Option<&str>, explanation: &str) -> Chunk {
            let chunk = Chunk::new(&task.id, "retry()", explanation, start())
                .with_file(file.map(str::to_string));
            self.store.put(&chunk).unwrap();
            chunk
        }

        fn seed(&self, path: &str, score: f64) {
            let mut record = Familiarity::empty(path, start());
            record.score = score;
            self.store.put(&record).unwrap();
        }
    }

    fn check_ids(request: &CheckRequest) -> Vec<String> {
        match request {
            CheckRequest::Questions { checks, .. } => {
                checks.iter().map(|c| c.check_id.clone()).collect()
            }
            other => panic!("expected questions, got {:?}", other),
        }
    }

    #[test]
    fn test_quality_table() {
        assert_eq!(quality_score(AnswerQuality::Correct), 1.0);
        assert_eq!(quality_score(AnswerQuality::Partial), 0.6);
        assert_eq!(quality_score(AnswerQuality::Incorrect), 0.2);
        assert_eq!(quality_score(AnswerQuality::NeedsExplanation), 0.1);
    }

    #[test]
    fn test_length_score() {
        assert_eq!(length_score("short"), 0.5);
        assert_eq!(length_score("exactly twenty chars"), 0.5);
        assert_eq!(length_score("because the retry budget caps load"), 1.0);
    }

    #[test]
    fn test_question_count_tiers() {
        let config = CheckConfig::default();
        assert_eq!(question_count(3, 0.0, &config), Some(3));
        assert_eq!(question_count(8, 30.0, &config), Some(5));
        assert_eq!(question_count(8, 35.0, &config), Some(3));
        assert_eq!(question_count(1, 49.0, &config), Some(1));
        assert_eq!(question_count(3, 50.0, &config), None);
        assert_eq!(question_count(0, 0.0, &config), None);
    }

    #[test]
    fn test_request_unknown_task() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.workflow().request("ghost", None).unwrap_err(),
            GraspError::NotFound {
                kind: RecordKind::Task,
                ..
            }
        ));
    }

    #[test]
    fn test_request_skips_after_design_review() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, Some("a.rs"), "uses backoff because of rate limits");
        let mut review = DesignReview::new(&task.id, ReviewScope::Approach, None, start());
        review.developer_response = Some("exponential backoff".into());
        fx.store.put(&review).unwrap();

        let result = fx.workflow().request(&task.id, None).unwrap();
        assert_eq!(result, CheckRequest::AlreadyReviewed);
        assert!(fx.store.all::<Check>().unwrap().is_empty());
    }

    #[test]
    fn test_design_reviewed_task_skips_check_end_to_end() {
        let fx = Fixture::new();
        fx.seed("known.rs", 70.0);
        fx.seed("new.rs", 20.0);

        let lifecycle = TaskLifecycle::new(&fx.store, &fx.config, &fx.clock);
        let started = lifecycle
            .start_task("add caching", vec!["known.rs".into(), "new.rs".into()])
            .unwrap();
        assert_eq!(started.suggested_mode, Mode::Guided);
        assert_eq!(started.average_familiarity, 45.0);

        let design = DesignReviewWorkflow::new(&fx.store, &fx.config, &fx.clock);
        let scopes = match design.request(&started.task_id).unwrap() {
            ReviewRequest::Opened { scopes, .. } => scopes,
            other => panic!("expected opened review, got {:?}", other),
        };
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].scope, ReviewScope::Approach);

        let answer = "Write-through cache keyed by user id, evicted on logout";
        match design
            .record_response(&scopes[0].design_review_id, answer)
            .unwrap()
        {
            ReviewResponse::Recap {
                entries,
                plan_prompt,
                ..
            } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].response, answer);
                assert!(plan_prompt.contains("implementation plan"));
            }
            other => panic!("expected recap, got {:?}", other),
        }

        lifecycle
            .log_chunk(ChunkRequest {
                task_id: Some(started.task_id.clone()),
                code: "cache.insert(user_id, profile)".into(),
                explanation: "populate on write so reads never miss".into(),
                file_path: Some("new.rs".into()),
                lines: None,
            })
            .unwrap();

        let result = fx.workflow().request(&started.task_id, None).unwrap();
        assert_eq!(result, CheckRequest::AlreadyReviewed);
        assert!(fx.store.all::<Check>().unwrap().is_empty());
    }

    #[test]
    fn test_unanswered_review_does_not_skip() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, None, "x");
        fx.store
            .put(&DesignReview::new(&task.id, ReviewScope::Approach, None, start()))
            .unwrap();

        let result = fx.workflow().request(&task.id, None).unwrap();
        assert_eq!(result.created(), 1);
    }

    #[test]
    fn test_request_nothing_to_check() {
        let fx = Fixture::new();
        let task = fx.task();
        assert_eq!(
            fx.workflow().request(&task.id, None).unwrap(),
            CheckRequest::NothingToCheck
        );

        fx.chunk(&task, None, "x");
        let ids = vec!["unknown".to_string()];
        assert_eq!(
            fx.workflow().request(&task.id, Some(&ids)).unwrap(),
            CheckRequest::NothingToCheck
        );
    }

    #[test]
    fn test_request_high_familiarity_returns_walkthrough() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.seed("a.rs", 60.0);
        fx.chunk(&task, Some("a.rs"), "retry with jitter");

        match fx.workflow().request(&task.id, None).unwrap() {
            CheckRequest::HighFamiliarity { walkthrough, .. } => {
                assert_eq!(walkthrough.len(), 1);
                assert_eq!(walkthrough[0].explanation, "retry with jitter");
            }
            other => panic!("expected walkthrough, got {:?}", other),
        }
        assert!(fx.store.all::<Check>().unwrap().is_empty());
    }

    #[test]
    fn test_request_creates_placeholders_round_robin() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.seed("a.rs", 40.0);
        fx.seed("b.rs", 30.0);
        let a = fx.chunk(&task, Some("a.rs"), "first");
        let b = fx.chunk(&task, Some("b.rs"), "second");
        let c = fx.chunk(&task, Some("a.rs"), "third");

        // Average 35 lands in the reduced tier: ceil(3 / 2) = 2.
        let result = fx.workflow().request(&task.id, None).unwrap();
        match &result {
            CheckRequest::Questions { checks, instructions, .. } => {
                assert_eq!(checks.len(), 2);
                assert_eq!(checks[0].chunk.chunk_id, a.id);
                assert_eq!(checks[1].chunk.chunk_id, b.id);
                assert_eq!(checks[0].question, PENDING_QUESTION);
                assert!(instructions.contains("ONE question"));
            }
            other => panic!("expected questions, got {:?}", other),
        }

        let stored = queries::checks_for_task(&fx.store, &task.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|c| c.is_pending()));
        assert!(stored.iter().all(|s| s.chunk_id.as_deref() != Some(c.id.as_str())));
    }

    #[test]
    fn test_request_restricted_to_chunk_ids() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, None, "first");
        let second = fx.chunk(&task, None, "second");

        let ids = vec![second.id.clone()];
        let result = fx.workflow().request(&task.id, Some(&ids)).unwrap();
        match result {
            CheckRequest::Questions { checks, .. } => {
                assert_eq!(checks.len(), 1);
                assert_eq!(checks[0].chunk.chunk_id, second.id);
            }
            other => panic!("expected questions, got {:?}", other),
        }
    }

    #[test]
    fn test_heuristic_source_stores_question_text() {
        let mut fx = Fixture::new();
        fx.questions = QuestionGenerator::heuristic();
        let task = fx.task();
        fx.chunk(&task, None, "polls instead of subscribing");

        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());
        let check: Check = fx.store.get(&ids[0]).unwrap().unwrap();
        assert_eq!(check.question_type, QuestionType::DesignDecision);
        assert_ne!(check.question, PENDING_QUESTION);
        assert!(check.expected_insight.is_some());
    }

    #[test]
    fn test_record_skip() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.seed("a.rs", 10.0);
        fx.chunk(&task, Some("a.rs"), "x");
        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());

        let recorded = fx.workflow().record_answer(&ids[0], None, true, None).unwrap();
        assert!(recorded.skipped);
        assert!(recorded.score.is_none());
        assert!(recorded.task_completed);

        let check: Check = fx.store.get(&ids[0]).unwrap().unwrap();
        assert!(check.skipped);
        assert!(check.developer_answer.is_none());

        let familiarity: Familiarity = fx.store.get("a.rs").unwrap().unwrap();
        assert!((familiarity.score - (10.0 + deltas::SKIPPED)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_answer_with_quality() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, Some("a.rs"), "x");
        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());

        let recorded = fx
            .workflow()
            .record_answer(&ids[0], Some("not sure"), false, Some(AnswerQuality::Partial))
            .unwrap();
        assert_eq!(recorded.score, Some(0.6));

        let familiarity: Familiarity = fx.store.get("a.rs").unwrap().unwrap();
        assert!((familiarity.score - deltas::ANSWERED_CORRECTLY).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_answer_incorrect() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, Some("a.rs"), "x");
        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());

        let recorded = fx
            .workflow()
            .record_answer(&ids[0], Some("no idea"), false, None)
            .unwrap();
        assert_eq!(recorded.score, Some(0.5));

        let familiarity: Familiarity = fx.store.get("a.rs").unwrap().unwrap();
        assert!((familiarity.score - deltas::ANSWERED_INCORRECTLY).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_answer_requires_answer() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, None, "x");
        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());

        let err = fx.workflow().record_answer(&ids[0], Some("  "), false, None).unwrap_err();
        assert!(matches!(err, GraspError::InvalidInput { .. }));
        let check: Check = fx.store.get(&ids[0]).unwrap().unwrap();
        assert!(check.is_pending());
    }

    #[test]
    fn test_resolved_check_never_reopens() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, None, "x");
        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());

        fx.workflow().record_answer(&ids[0], None, true, None).unwrap();
        let err = fx
            .workflow()
            .record_answer(&ids[0], Some("actually I know this"), false, None)
            .unwrap_err();
        assert!(matches!(err, GraspError::InvalidInput { .. }));

        let check: Check = fx.store.get(&ids[0]).unwrap().unwrap();
        assert!(check.skipped);
        assert!(check.developer_answer.is_none());
    }

    #[test]
    fn test_record_answer_unknown_check() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.workflow().record_answer("ghost", None, true, None).unwrap_err(),
            GraspError::NotFound {
                kind: RecordKind::Check,
                ..
            }
        ));
    }

    #[test]
    fn test_task_completes_after_last_check() {
        let fx = Fixture::new();
        let task = fx.task();
        fx.chunk(&task, None, "one");
        fx.chunk(&task, None, "two");
        let ids = check_ids(&fx.workflow().request(&task.id, None).unwrap());
        assert_eq!(ids.len(), 2);

        let first = fx
            .workflow()
            .record_answer(&ids[0], Some("the retry loop bounds total latency"), false, None)
            .unwrap();
        assert!(!first.task_completed);
        let second = fx.workflow().record_answer(&ids[1], None, true, None).unwrap();
        assert!(second.task_completed);

        let stored: Task = fx.store.get(&task.id).unwrap().unwrap();
        assert_eq!(stored.completed_at, Some(start()));
    }
}
