//! Comprehension question generation.
//!
//! Questions come from one of three sources: the calling agent (placeholder
//! text it phrases itself), a deterministic heuristic, or an external text
//! generator. Any generator failure degrades to the heuristic, and the check
//! workflow never learns which source produced a question.

use std::io::Write as IoWrite;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::config::QuestionsConfig;
use crate::core::state::{Chunk, QuestionType, PENDING_QUESTION};
use crate::error::{FailOpen, GraspError, Result};

/// Chunks longer than this many lines get a walkthrough question.
pub const WALKTHROUGH_MIN_LINES: usize = 30;

pub const SYSTEM_PROMPT: &str = "You generate questions that verify whether a developer truly \
understands code they just received from an AI assistant.

Rules:
1. Ask about design decisions: why this approach and not another.
2. Ask about trade-offs: what are the consequences of this choice.
3. Ask about edge cases: what inputs or failures would break it.
4. Ask about debugging: if this breaks in production, how would they diagnose it.
5. Never ask trivia or syntax questions, or anything obvious from reading the code.
6. Phrase questions like a colleague in code review, not like an exam.
7. Low familiarity calls for fundamental questions; high familiarity for nuanced ones.

Output EXACTLY a JSON array. Each element has: question (string), type (one of: \
design_decision, edge_case, trade_off, walkthrough, debugging), expected_insight (what a good \
answer would include).";

/// Capability to turn a prompt into text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, system: &str) -> Result<String>;
}

/// Runs an external command, writing the system prompt and prompt to its
/// stdin and reading the response from stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. Returns `None` if empty.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, prompt: &str, system: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GraspError::external(format!("{} not available: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = format!("{}\n\n{}", system, prompt);
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| GraspError::external(format!("writing prompt failed: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| GraspError::external(format!("{} failed: {}", self.program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GraspError::external(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// A question bound to the chunk it asks about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedQuestion {
    pub chunk_id: String,
    pub question: String,
    pub question_type: QuestionType,
    pub expected_insight: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    expected_insight: Option<String>,
}

/// Question type the heuristic picks for a chunk.
pub fn heuristic_type(chunk: &Chunk) -> QuestionType {
    let explanation = chunk.explanation.to_lowercase();
    if chunk.line_count() > WALKTHROUGH_MIN_LINES {
        QuestionType::Walkthrough
    } else if explanation.contains("because") || explanation.contains("instead") {
        QuestionType::DesignDecision
    } else {
        QuestionType::EdgeCase
    }
}

/// Deterministic question for a chunk. Never fails.
pub fn heuristic_question(chunk: &Chunk) -> GeneratedQuestion {
    let question_type = heuristic_type(chunk);
    let (question, insight) = match question_type {
        QuestionType::Walkthrough => (
            "This is a substantial piece of code. Can you walk through the main execution path \
             and explain what happens at each stage?",
            "Developer can trace the flow without reading the code",
        ),
        QuestionType::DesignDecision => (
            "A specific design choice was made here. Can you explain why this approach was \
             chosen and what would happen with a different one?",
            "Developer understands the trade-off, not just the implementation",
        ),
        _ => (
            "If this code receives unexpected input or a dependency goes down, what happens? \
             What would you see in the logs?",
            "Developer can predict failure modes",
        ),
    };
    GeneratedQuestion {
        chunk_id: chunk.id.clone(),
        question: question.to_string(),
        question_type,
        expected_insight: Some(insight.to_string()),
    }
}

/// Extract questions from generator output.
///
/// Takes the outermost `[...]` span so fenced or chatty responses still
/// parse. Unknown types become `design_decision`.
fn parse_questions(text: &str) -> Vec<RawQuestion> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<RawQuestion>>(&text[start..=end]) {
        Ok(questions) => questions
            .into_iter()
            .filter(|q| !q.question.trim().is_empty())
            .collect(),
        Err(err) => {
            tracing::debug!("generator output is not a question array: {}", err);
            Vec::new()
        }
    }
}

fn familiarity_label(familiarity: f64) -> &'static str {
    if familiarity > 70.0 {
        "high"
    } else if familiarity > 40.0 {
        "moderate"
    } else {
        "low"
    }
}

fn build_prompt(chunks: &[&Chunk], intent: &str, familiarity: f64) -> String {
    let code = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let header = match &chunk.file_path {
                Some(path) => format!("File: {}", path),
                None => format!("Chunk {}", i + 1),
            };
            format!(
                "--- {} ---\n{}\n\nExplanation: {}",
                header, chunk.code, chunk.explanation
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "The developer asked: \"{}\"\n\nThe AI generated this code:\n\n{}\n\n\
         Developer's familiarity with these files: {:.0}/100 ({})\n\n\
         Generate exactly {} comprehension question(s), one per code block in order. \
         Return ONLY a JSON array, no other text.",
        intent,
        code,
        familiarity,
        familiarity_label(familiarity),
        chunks.len()
    )
}

enum Source {
    Agent,
    Heuristic,
    Generator(Box<dyn TextGenerator>),
}

/// Produces one question per requested chunk slot.
pub struct QuestionGenerator {
    source: Source,
}

impl QuestionGenerator {
    /// Placeholder questions for the calling agent to phrase.
    pub fn agent() -> Self {
        Self {
            source: Source::Agent,
        }
    }

    pub fn heuristic() -> Self {
        Self {
            source: Source::Heuristic,
        }
    }

    pub fn with_generator(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            source: Source::Generator(generator),
        }
    }

    /// Pick the source named in config.
    ///
    /// `command` without a usable command line falls back to the heuristic.
    pub fn from_config(config: &QuestionsConfig) -> Self {
        match config.source.as_str() {
            "heuristic" => Self::heuristic(),
            "command" => match config
                .command
                .as_deref()
                .and_then(CommandGenerator::from_command_line)
            {
                Some(generator) => Self::with_generator(Box::new(generator)),
                None => {
                    tracing::warn!("questions.source = command but no command configured");
                    Self::heuristic()
                }
            },
            _ => Self::agent(),
        }
    }

    /// One question per slot, in slot order.
    pub fn generate(&self, slots: &[&Chunk], intent: &str, familiarity: f64) -> Vec<GeneratedQuestion> {
        match &self.source {
            Source::Agent => slots
                .iter()
                .map(|chunk| GeneratedQuestion {
                    chunk_id: chunk.id.clone(),
                    question: PENDING_QUESTION.to_string(),
                    question_type: heuristic_type(chunk),
                    expected_insight: None,
                })
                .collect(),
            Source::Heuristic => slots.iter().map(|c| heuristic_question(c)).collect(),
            Source::Generator(generator) => {
                let prompt = build_prompt(slots, intent, familiarity);
                let text = generator
                    .generate(&prompt, SYSTEM_PROMPT)
                    .fail_open_default("question generation");
                let mut parsed = parse_questions(&text).into_iter();

                slots
                    .iter()
                    .map(|chunk| match parsed.next() {
                        Some(raw) => GeneratedQuestion {
                            chunk_id: chunk.id.clone(),
                            question: raw.question,
                            question_type: QuestionType::parse_lenient(&raw.kind),
                            expected_insight: raw.expected_insight,
                        },
                        None => heuristic_question(chunk),
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    struct Canned(Result<String>);

    impl TextGenerator for Canned {
        fn generate(&self, _prompt: &str, _system: &str) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(GraspError::external("offline")),
            }
        }
    }

    fn chunk(code: &str, explanation: &str) -> Chunk {
        Chunk::new("t", code, explanation, now())
    }

    #[test]
    fn test_heuristic_type_rules() {
        let long = (0..31).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        assert_eq!(heuristic_type(&chunk(&long, "because")), QuestionType::Walkthrough);
        assert_eq!(
            heuristic_type(&chunk("x", "Used a map instead of a list")),
            QuestionType::DesignDecision
        );
        assert_eq!(
            heuristic_type(&chunk("x", "Chosen BECAUSE it is fast")),
            QuestionType::DesignDecision
        );
        assert_eq!(heuristic_type(&chunk("x", "adds a field")), QuestionType::EdgeCase);
    }

    #[test]
    fn test_agent_source_emits_placeholders() {
        let c = chunk("x", "adds a field");
        let questions = QuestionGenerator::agent().generate(&[&c], "intent", 10.0);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, PENDING_QUESTION);
        assert_eq!(questions[0].chunk_id, c.id);
    }

    #[test]
    fn test_generator_output_is_parsed() {
        let text = "Sure! ```json\n[{\"question\": \"Why a map?\", \"type\": \"trade_off\", \
                    \"expected_insight\": \"lookup cost\"}, {\"question\": \"What if empty?\", \
                    \"type\": \"nonsense\"}]\n```";
        let generator = QuestionGenerator::with_generator(Box::new(Canned(Ok(text.into()))));
        let a = chunk("x", "a");
        let b = chunk("y", "b");

        let questions = generator.generate(&[&a, &b], "intent", 10.0);
        assert_eq!(questions[0].question, "Why a map?");
        assert_eq!(questions[0].question_type, QuestionType::TradeOff);
        assert_eq!(questions[0].chunk_id, a.id);
        assert_eq!(questions[1].question_type, QuestionType::DesignDecision);
        assert!(questions[1].expected_insight.is_none());
    }

    #[test]
    fn test_generator_failure_falls_back_to_heuristic() {
        let generator = QuestionGenerator::with_generator(Box::new(Canned(Err(
            GraspError::external("offline"),
        ))));
        let c = chunk("x", "done instead of polling");
        let questions = generator.generate(&[&c], "intent", 10.0);
        assert_eq!(questions, vec![heuristic_question(&c)]);
    }

    #[test]
    fn test_short_generator_output_is_padded() {
        let text = "[{\"question\": \"Only one\", \"type\": \"edge_case\"}]";
        let generator = QuestionGenerator::with_generator(Box::new(Canned(Ok(text.into()))));
        let a = chunk("x", "a");
        let b = chunk("y", "b");
        let questions = generator.generate(&[&a, &b], "intent", 10.0);
        assert_eq!(questions[0].question, "Only one");
        assert_eq!(questions[1], heuristic_question(&b));
    }

    #[test]
    fn test_unparseable_output_falls_back() {
        assert!(parse_questions("no json here").is_empty());
        assert!(parse_questions("] backwards [").is_empty());
        assert!(parse_questions("[{\"nope\": 1}]").is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = QuestionsConfig::default();
        assert!(matches!(QuestionGenerator::from_config(&config).source, Source::Agent));

        config.source = "heuristic".into();
        assert!(matches!(QuestionGenerator::from_config(&config).source, Source::Heuristic));

        config.source = "command".into();
        assert!(matches!(QuestionGenerator::from_config(&config).source, Source::Heuristic));

        config.command = Some("llm -m local".into());
        assert!(matches!(
            QuestionGenerator::from_config(&config).source,
            Source::Generator(_)
        ));
    }

    #[test]
    fn test_command_line_parsing() {
        assert_eq!(
            CommandGenerator::from_command_line("llm -m local"),
            Some(CommandGenerator::new("llm", vec!["-m".into(), "local".into()]))
        );
        assert!(CommandGenerator::from_command_line("   ").is_none());
    }

    #[test]
    fn test_missing_command_is_external_failure() {
        let generator = CommandGenerator::new("grasp-definitely-not-installed", vec![]);
        let err = generator.generate("p", "s").unwrap_err();
        assert!(matches!(err, GraspError::ExternalService { .. }));
    }

    #[test]
    fn test_prompt_mentions_count_and_label() {
        let a = chunk("fn a() {}", "entry").with_file(Some("src/a.rs".into()));
        let prompt = build_prompt(&[&a], "add entry", 55.0);
        assert!(prompt.contains("File: src/a.rs"));
        assert!(prompt.contains("Generate exactly 1"));
        assert!(prompt.contains("(moderate)"));
    }
}
