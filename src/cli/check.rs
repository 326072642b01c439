//! Comprehension check commands for Grasp.
//!
//! `check` creates the post-code questions for a task and `record-answer`
//! finalizes one of them with an answer or a skip.

use crate::cli::{CommandOutput, Render};
use crate::config::Config;
use crate::core::check::{AnswerRecorded, CheckRequest, CheckWorkflow, ChunkSummary};
use crate::core::clock::{Clock, SystemClock};
use crate::core::questions::QuestionGenerator;
use crate::core::state::{AnswerQuality, PENDING_QUESTION};
use crate::error::{GraspError, Result};
use crate::storage::Store;

fn summary_line(chunk: &ChunkSummary) -> String {
    match &chunk.file_path {
        Some(path) => format!("{} ({}): {}", chunk.chunk_id, path, chunk.explanation),
        None => format!("{}: {}", chunk.chunk_id, chunk.explanation),
    }
}

impl Render for CheckRequest {
    fn render(&self) -> String {
        match self {
            Self::AlreadyReviewed => "Design was already reviewed for this task. Comprehension \
                                      check skipped."
                .to_string(),
            Self::NothingToCheck => {
                "No chunks logged for this task. Log code with `grasp log-chunk` first.".to_string()
            }
            Self::HighFamiliarity {
                familiarity,
                walkthrough,
            } => {
                let mut lines = vec![format!(
                    "Developer familiarity is {:.0}/100. No questions needed; summarize what was \
                     built:",
                    familiarity
                )];
                lines.extend(walkthrough.iter().map(|c| format!("  - {}", summary_line(c))));
                lines.join("\n")
            }
            Self::Questions {
                task_id,
                intent,
                familiarity,
                checks,
                instructions,
            } => {
                let mut lines = vec![
                    format!("--- COMPREHENSION CHECK: {} ---", intent),
                    format!("Task: {}", task_id),
                    format!("Familiarity: {:.0}/100", familiarity),
                    String::new(),
                ];
                for (i, check) in checks.iter().enumerate() {
                    lines.push(format!(
                        "{}. [{}] {}",
                        i + 1,
                        check.question_type.as_str(),
                        check.check_id
                    ));
                    if check.question == PENDING_QUESTION {
                        lines.push("   Question: compose one from the chunk below.".to_string());
                    } else {
                        lines.push(format!("   Question: {}", check.question));
                    }
                    lines.push(format!("   Chunk {}", summary_line(&check.chunk)));
                }
                lines.push(String::new());
                lines.push(instructions.clone());
                lines.join("\n")
            }
        }
    }
}

impl Render for AnswerRecorded {
    fn render(&self) -> String {
        let mut text = self.message.clone();
        if self.task_completed {
            text.push_str("\nAll checks for this task are resolved. Task completed.");
        }
        text
    }
}

/// Parse the `--quality` flag.
pub fn parse_quality(s: &str) -> Result<AnswerQuality> {
    AnswerQuality::parse(s).ok_or_else(|| {
        GraspError::invalid_input(format!(
            "unknown quality '{}' (expected correct, partial, incorrect or needs_explanation)",
            s
        ))
    })
}

/// The comprehension check command implementation.
pub struct CheckCommand<S: Store> {
    store: S,
    config: Config,
    clock: Box<dyn Clock>,
    questions: QuestionGenerator,
}

impl<S: Store> CheckCommand<S> {
    /// Create a new check command with the configured question source.
    pub fn new(store: S, config: Config) -> Self {
        let questions = QuestionGenerator::from_config(&config.questions);
        Self::with_parts(store, config, Box::new(SystemClock), questions)
    }

    pub fn with_parts(
        store: S,
        config: Config,
        clock: Box<dyn Clock>,
        questions: QuestionGenerator,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            questions,
        }
    }

    fn workflow(&self) -> CheckWorkflow<'_, S> {
        CheckWorkflow::new(
            &self.store,
            &self.config,
            self.clock.as_ref(),
            &self.questions,
        )
    }

    /// Create checks; an empty `chunk_ids` means every chunk of the task.
    pub fn request(&self, task_id: &str, chunk_ids: &[String]) -> CommandOutput<CheckRequest> {
        let selection = (!chunk_ids.is_empty()).then_some(chunk_ids);
        self.workflow().request(task_id, selection).into()
    }

    pub fn answer(
        &self,
        check_id: &str,
        answer: Option<&str>,
        skipped: bool,
        quality: Option<&str>,
    ) -> CommandOutput<AnswerRecorded> {
        let quality = match quality.map(parse_quality).transpose() {
            Ok(quality) => quality,
            Err(err) => return Err(err).into(),
        };
        self.workflow()
            .record_answer(check_id, answer, skipped, quality)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputOptions;
    use crate::core::clock::FixedClock;
    use crate::core::state::{Check, Chunk, Mode, Task};
    use crate::storage::{MemoryStore, StoreExt};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn setup(questions: QuestionGenerator) -> (Arc<MemoryStore>, CheckCommand<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let cmd = CheckCommand::with_parts(
            Arc::clone(&store),
            Config::default(),
            Box::new(FixedClock::new(start())),
            questions,
        );
        (store, cmd)
    }

    fn task_with_chunk(store: &MemoryStore) -> (Task, Chunk) {
        let task = Task::new("add retry", None, Mode::Guided, start());
        store.put(&task).unwrap();
        let chunk = Chunk::new(&task.id, "loop {}", "retries with backoff", start())
            .with_file(Some("src/retry.rs".into()));
        store.put(&chunk).unwrap();
        (task, chunk)
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality("correct").unwrap(), AnswerQuality::Correct);
        assert_eq!(
            parse_quality("needs-explanation").unwrap(),
            AnswerQuality::NeedsExplanation
        );
        assert!(parse_quality("great").is_err());
    }

    #[test]
    fn test_request_renders_pending_questions() {
        let (store, cmd) = setup(QuestionGenerator::agent());
        let (task, chunk) = task_with_chunk(&store);

        let output = cmd.request(&task.id, &[]);
        let text = output.format(&OutputOptions::default());
        assert!(text.starts_with("--- COMPREHENSION CHECK: add retry ---"));
        assert!(text.contains("compose one from the chunk below"));
        assert!(text.contains(&format!("{} (src/retry.rs): retries with backoff", chunk.id)));
        assert!(text.contains("grasp record-answer"));
    }

    #[test]
    fn test_request_renders_heuristic_question() {
        let (store, cmd) = setup(QuestionGenerator::heuristic());
        let (task, _) = task_with_chunk(&store);

        let text = cmd.request(&task.id, &[]).format(&OutputOptions::default());
        assert!(!text.contains("compose one"));
        assert!(text.contains("   Question: "));
    }

    #[test]
    fn test_request_unknown_chunk_selection_is_nothing_to_check() {
        let (store, cmd) = setup(QuestionGenerator::agent());
        let (task, _) = task_with_chunk(&store);

        let output = cmd.request(&task.id, &["missing".to_string()]);
        assert_eq!(output.result, Some(CheckRequest::NothingToCheck));
    }

    #[test]
    fn test_answer_completes_task() {
        let (store, cmd) = setup(QuestionGenerator::agent());
        let (task, _) = task_with_chunk(&store);
        let Some(CheckRequest::Questions { checks, .. }) = cmd.request(&task.id, &[]).result else {
            panic!("expected questions");
        };
        assert_eq!(checks.len(), 1);

        let output = cmd.answer(
            &checks[0].check_id,
            Some("backoff doubles each attempt"),
            false,
            Some("correct"),
        );
        let recorded = output.result.clone().unwrap();
        assert_eq!(recorded.score, Some(1.0));
        assert!(recorded.task_completed);
        assert!(output
            .format(&OutputOptions::default())
            .contains("Task completed."));

        let stored: Task = store.get(&task.id).unwrap().unwrap();
        assert!(stored.is_completed());
    }

    #[test]
    fn test_answer_invalid_quality_writes_nothing() {
        let (store, cmd) = setup(QuestionGenerator::agent());
        let (task, _) = task_with_chunk(&store);
        let check = Check::new(&task.id, "q", crate::core::state::QuestionType::EdgeCase, start());
        store.put(&check).unwrap();

        let output = cmd.answer(&check.id, Some("an answer"), false, Some("stellar"));
        assert!(!output.success);
        let stored: Check = store.get(&check.id).unwrap().unwrap();
        assert!(stored.is_pending());
    }

    #[test]
    fn test_answer_requires_answer_or_skip() {
        let (store, cmd) = setup(QuestionGenerator::agent());
        let (task, _) = task_with_chunk(&store);
        let check = Check::new(&task.id, "q", crate::core::state::QuestionType::EdgeCase, start());
        store.put(&check).unwrap();

        let output = cmd.answer(&check.id, None, false, None);
        assert!(output.error.unwrap().contains("skipped"));

        let output = cmd.answer(&check.id, None, true, None);
        assert!(output.result.unwrap().skipped);
    }
}
