//! Record types for Grasp.
//!
//! Every record is owned by the store and mutated only through it. Tasks own
//! chunks, checks and design reviews by id; familiarity is keyed by file path
//! and linked to the rest only through shared path strings.

use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ulid::{Generator, Ulid};

use crate::error::GraspError;

/// Placeholder question text for checks the calling agent must phrase.
pub const PENDING_QUESTION: &str = "pending_ai_generation";

/// Generate a new record id.
///
/// Ids are ULIDs drawn from a process-wide monotonic generator, so ids
/// created in the same millisecond still sort in creation order.
pub fn new_id() -> String {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    let generator = GENERATOR.get_or_init(|| Mutex::new(Generator::new()));
    let id = match generator.lock() {
        Ok(mut guard) => guard.generate().unwrap_or_else(|_| Ulid::new()),
        Err(_) => Ulid::new(),
    };
    id.to_string()
}

/// Operating mode suggested for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Unfamiliar territory: design review first, explain everything.
    #[default]
    Guided,
    /// The developer knows the area: generate efficiently.
    FullSpeed,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guided => "guided",
            Self::FullSpeed => "full_speed",
        }
    }
}

/// Kind of comprehension question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    DesignDecision,
    EdgeCase,
    TradeOff,
    Walkthrough,
    Debugging,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        Self::DesignDecision,
        Self::EdgeCase,
        Self::TradeOff,
        Self::Walkthrough,
        Self::Debugging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DesignDecision => "design_decision",
            Self::EdgeCase => "edge_case",
            Self::TradeOff => "trade_off",
            Self::Walkthrough => "walkthrough",
            Self::Debugging => "debugging",
        }
    }

    /// Parse a question type, defaulting to `DesignDecision` for anything unknown.
    pub fn parse_lenient(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .unwrap_or_default()
    }
}

/// Scope of a design review question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewScope {
    Approach,
    TradeOffs,
    EdgeCases,
    Debugging,
}

impl ReviewScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approach => "approach",
            Self::TradeOffs => "trade_offs",
            Self::EdgeCases => "edge_cases",
            Self::Debugging => "debugging",
        }
    }

    /// One-line guidance for the agent on what to ask under this scope.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Approach => {
                "Propose your strategy and ask about the key design decision."
            }
            Self::TradeOffs => "Ask what the developer is willing to give up for this approach.",
            Self::EdgeCases => "Ask about the one failure mode that matters most.",
            Self::Debugging => {
                "Ask how they would diagnose this if it broke in production."
            }
        }
    }
}

/// Caller-supplied grade for a comprehension answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerQuality {
    Correct,
    Partial,
    Incorrect,
    NeedsExplanation,
}

impl AnswerQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Partial => "partial",
            Self::Incorrect => "incorrect",
            Self::NeedsExplanation => "needs_explanation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "correct" => Some(Self::Correct),
            "partial" => Some(Self::Partial),
            "incorrect" => Some(Self::Incorrect),
            "needs_explanation" => Some(Self::NeedsExplanation),
            _ => None,
        }
    }
}

/// One unit of developer intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub intent: String,
    /// Files the task declared up front, if any.
    #[serde(default, deserialize_with = "deserialize_path_list")]
    pub files: Option<Vec<String>>,
    /// Decided once at creation.
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task. Duplicate paths are dropped, order is kept.
    pub fn new(
        intent: impl Into<String>,
        files: Option<Vec<String>>,
        mode: Mode,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            intent: intent.into(),
            files: files.map(dedup_paths),
            mode,
            started_at,
            completed_at: None,
        }
    }

    /// Declared files, or an empty slice.
    pub fn file_paths(&self) -> &[String] {
        self.files.as_deref().unwrap_or(&[])
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One logged block of AI-generated code plus its rationale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub task_id: String,
    pub code: String,
    pub explanation: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub lines_start: Option<u32>,
    #[serde(default)]
    pub lines_end: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(
        task_id: impl Into<String>,
        code: impl Into<String>,
        explanation: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            task_id: task_id.into(),
            code: code.into(),
            explanation: explanation.into(),
            file_path: None,
            lines_start: None,
            lines_end: None,
            created_at,
        }
    }

    pub fn with_file(mut self, file_path: Option<String>) -> Self {
        self.file_path = file_path;
        self
    }

    pub fn with_lines(mut self, lines: Option<(u32, u32)>) -> Self {
        if let Some((start, end)) = lines {
            self.lines_start = Some(start);
            self.lines_end = Some(end);
        }
        self
    }

    /// Number of lines of code in the chunk.
    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }

    /// Whether the chunk covers `line`. Chunks without a range never match.
    pub fn covers_line(&self, line: u32) -> bool {
        match (self.lines_start, self.lines_end) {
            (Some(start), Some(end)) => start <= line && line <= end,
            _ => false,
        }
    }
}

/// A post-code comprehension question and its eventual grading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Check {
    pub id: String,
    pub task_id: String,
    #[serde(default)]
    pub chunk_id: Option<String>,
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub expected_insight: Option<String>,
    #[serde(default)]
    pub developer_answer: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub skipped: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Check {
    pub fn new(
        task_id: impl Into<String>,
        question: impl Into<String>,
        question_type: QuestionType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            task_id: task_id.into(),
            chunk_id: None,
            question: question.into(),
            question_type,
            expected_insight: None,
            developer_answer: None,
            score: None,
            skipped: false,
            created_at,
            resolved_at: None,
        }
    }

    pub fn with_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    pub fn with_expected_insight(mut self, insight: Option<String>) -> Self {
        self.expected_insight = insight;
        self
    }

    /// Neither answered nor skipped.
    pub fn is_pending(&self) -> bool {
        self.developer_answer.is_none() && !self.skipped
    }

    /// Answered or skipped. Abandoned placeholders are not active.
    pub fn is_active(&self) -> bool {
        !self.is_pending()
    }

    /// Answered (not skipped).
    pub fn is_answered(&self) -> bool {
        self.developer_answer.is_some() && !self.skipped
    }

    pub fn is_passed(&self) -> bool {
        self.score.is_some_and(|s| s > 0.5)
    }
}

/// A pre-code design discussion question and its eventual response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignReview {
    pub id: String,
    pub task_id: String,
    pub scope: ReviewScope,
    #[serde(default)]
    pub developer_response: Option<String>,
    #[serde(default, deserialize_with = "deserialize_path_list")]
    pub file_paths: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl DesignReview {
    pub fn new(
        task_id: impl Into<String>,
        scope: ReviewScope,
        file_paths: Option<Vec<String>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            task_id: task_id.into(),
            scope,
            developer_response: None,
            file_paths: file_paths.filter(|p| !p.is_empty()),
            created_at,
            responded_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.developer_response.is_some()
    }

    pub fn paths(&self) -> &[String] {
        self.file_paths.as_deref().unwrap_or(&[])
    }
}

/// Per-file understanding score, bounded to `[0, 100]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Familiarity {
    pub file_path: String,
    pub score: f64,
    pub last_interaction: DateTime<Utc>,
    pub interactions: u32,
    /// How many of the interactions were human modifications.
    #[serde(default)]
    pub modifications: u32,
}

impl Familiarity {
    /// A fresh record with no interactions.
    pub fn empty(file_path: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            file_path: file_path.into(),
            score: 0.0,
            last_interaction: now,
            interactions: 0,
            modifications: 0,
        }
    }
}

/// Daily comprehension snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub date: NaiveDate,
    pub overall_score: u32,
    pub checks_passed: usize,
    pub checks_skipped: usize,
    pub chunks_modified: usize,
    pub chunks_accepted: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Drop duplicate and empty paths, keeping first occurrence order.
pub fn dedup_paths(paths: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    paths
        .into_iter()
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .collect()
}

/// Deserialize a stored file list.
///
/// Accepts a JSON array, null, or a legacy string holding an encoded array.
/// Anything unparseable is logged and treated as absent.
fn deserialize_path_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(path_list_from_value))
}

fn path_list_from_value(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(paths) => Some(paths),
            Err(err) => {
                let err = GraspError::malformed(format!("file list {:?}: {}", raw, err));
                tracing::warn!("{} (treating as absent)", err);
                None
            }
        },
        other => {
            let err = GraspError::malformed(format!("file list {}", other));
            tracing::warn!("{} (treating as absent)", err);
            None
        }
    }
}
