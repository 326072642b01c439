//! Configuration loading for Grasp.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.grasp/config.toml`)
//! 3. User config (`~/.grasp/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The thresholds below are the tunable
//! policy surface of the familiarity tiers; the system runs with the
//! defaults when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GraspError, Result};

/// Valid values for `hooks.block_decision`.
pub const VALID_BLOCK_DECISIONS: &[&str] = &["deny", "ask"];

/// Valid values for `questions.source`.
pub const VALID_QUESTION_SOURCES: &[&str] = &["agent", "heuristic", "command"];

/// Main configuration struct for Grasp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Task creation and recency.
    pub tasks: TaskConfig,
    /// Design review tiering.
    pub design_review: DesignReviewConfig,
    /// Comprehension check tiering.
    pub checks: CheckConfig,
    /// Hook tool matching and enforcement.
    pub hooks: HooksConfig,
    /// Question generation source.
    pub questions: QuestionsConfig,
}

/// Task creation and recency configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    /// Average familiarity strictly above which a task runs at full speed.
    pub full_speed_threshold: f64,
    /// How far back the hook looks for the current task.
    pub recency_window_minutes: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            full_speed_threshold: 70.0,
            recency_window_minutes: 60,
        }
    }
}

impl TaskConfig {
    /// The recency window as a chrono duration.
    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.recency_window_minutes))
    }
}

/// Design review scope tiering.
///
/// `skip_threshold` and above: no review. At or below `exhaustive_threshold`:
/// all four scopes. At or below `broad_threshold`: approach and edge cases.
/// Anything else below the skip threshold: approach only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DesignReviewConfig {
    pub skip_threshold: f64,
    pub broad_threshold: f64,
    pub exhaustive_threshold: f64,
}

impl Default for DesignReviewConfig {
    fn default() -> Self {
        Self {
            skip_threshold: 50.0,
            broad_threshold: 20.0,
            exhaustive_threshold: 10.0,
        }
    }
}

/// Comprehension check question-count tiering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckConfig {
    /// Average familiarity at or above which checks are skipped.
    pub skip_threshold: f64,
    /// Above this (and below skip), the question count is halved.
    pub reduced_threshold: f64,
    /// Upper bound on the base question count.
    pub max_questions: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            skip_threshold: 50.0,
            reduced_threshold: 30.0,
            max_questions: 5,
        }
    }
}

/// Hook configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HooksConfig {
    /// Tool names treated as file writes.
    pub write_tools: Vec<String>,
    /// Tool names treated as file reads.
    pub read_tools: Vec<String>,
    /// Permission decision used when blocking: "deny" or "ask".
    pub block_decision: String,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            write_tools: vec![
                "Write".to_string(),
                "Edit".to_string(),
                "MultiEdit".to_string(),
                "NotebookEdit".to_string(),
            ],
            read_tools: vec!["Read".to_string()],
            block_decision: "deny".to_string(),
        }
    }
}

impl HooksConfig {
    /// Check if a block decision value is valid.
    pub fn is_valid_block_decision(value: &str) -> bool {
        VALID_BLOCK_DECISIONS.contains(&value)
    }

    /// Whether a tool name is write-shaped.
    pub fn is_write_tool(&self, tool_name: &str) -> bool {
        self.write_tools.iter().any(|t| t == tool_name)
    }

    /// Whether a tool name is read-shaped.
    pub fn is_read_tool(&self, tool_name: &str) -> bool {
        self.read_tools.iter().any(|t| t == tool_name)
    }
}

/// Question generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuestionsConfig {
    /// "agent" leaves question text to the calling agent, "heuristic" uses
    /// deterministic questions, "command" runs an external generator.
    pub source: String,
    /// Command line for the "command" source. The prompt is piped to stdin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Default for QuestionsConfig {
    fn default() -> Self {
        Self {
            source: "agent".to_string(),
            command: None,
        }
    }
}

impl QuestionsConfig {
    /// Check if a question source value is valid.
    pub fn is_valid_source(value: &str) -> bool {
        VALID_QUESTION_SOURCES.contains(&value)
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.grasp/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = grasp_home()?;
        let config_path = home.join("config.toml");
        Self::load_from_file(&config_path).ok()
    }

    /// Load project config from `.grasp/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = project_config_path(cwd);
        match Self::load_from_file(&config_path) {
            Ok(config) => Some(config),
            Err(GraspError::Storage { .. }) => None,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), "ignoring project config: {}", err);
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| GraspError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| GraspError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // GRASP_FULL_SPEED_THRESHOLD
        if let Ok(val) = env::var("GRASP_FULL_SPEED_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(n) if (0.0..=100.0).contains(&n) => self.tasks.full_speed_threshold = n,
                _ => eprintln!(
                    "Warning: Invalid GRASP_FULL_SPEED_THRESHOLD value '{}'. \
                    Expected a number in [0, 100]. Using '{}'.",
                    val, self.tasks.full_speed_threshold
                ),
            }
        }

        // GRASP_RECENCY_MINUTES
        if let Ok(val) = env::var("GRASP_RECENCY_MINUTES") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => self.tasks.recency_window_minutes = n,
                _ => eprintln!(
                    "Warning: Invalid GRASP_RECENCY_MINUTES value '{}'. \
                    Expected a positive integer. Using '{}'.",
                    val, self.tasks.recency_window_minutes
                ),
            }
        }

        // GRASP_BLOCK_DECISION
        if let Ok(val) = env::var("GRASP_BLOCK_DECISION") {
            if HooksConfig::is_valid_block_decision(&val) {
                self.hooks.block_decision = val;
            } else {
                eprintln!(
                    "Warning: Invalid GRASP_BLOCK_DECISION value '{}'. \
                    Valid values: {:?}. Using '{}'.",
                    val, VALID_BLOCK_DECISIONS, self.hooks.block_decision
                );
            }
        }

        // GRASP_QUESTION_SOURCE
        if let Ok(val) = env::var("GRASP_QUESTION_SOURCE") {
            if QuestionsConfig::is_valid_source(&val) {
                self.questions.source = val;
            } else {
                eprintln!(
                    "Warning: Invalid GRASP_QUESTION_SOURCE value '{}'. \
                    Valid values: {:?}. Using '{}'.",
                    val, VALID_QUESTION_SOURCES, self.questions.source
                );
            }
        }

        // GRASP_QUESTION_COMMAND
        if let Ok(val) = env::var("GRASP_QUESTION_COMMAND") {
            if !val.trim().is_empty() {
                self.questions.command = Some(val);
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// Field-by-field: every non-default value in `other` wins. A layer
    /// cannot reset a value back to its default.
    fn merge(mut self, other: Config) -> Self {
        let tasks = TaskConfig::default();
        if other.tasks.full_speed_threshold != tasks.full_speed_threshold {
            self.tasks.full_speed_threshold = other.tasks.full_speed_threshold;
        }
        if other.tasks.recency_window_minutes != tasks.recency_window_minutes {
            self.tasks.recency_window_minutes = other.tasks.recency_window_minutes;
        }

        let review = DesignReviewConfig::default();
        if other.design_review.skip_threshold != review.skip_threshold {
            self.design_review.skip_threshold = other.design_review.skip_threshold;
        }
        if other.design_review.broad_threshold != review.broad_threshold {
            self.design_review.broad_threshold = other.design_review.broad_threshold;
        }
        if other.design_review.exhaustive_threshold != review.exhaustive_threshold {
            self.design_review.exhaustive_threshold = other.design_review.exhaustive_threshold;
        }

        let checks = CheckConfig::default();
        if other.checks.skip_threshold != checks.skip_threshold {
            self.checks.skip_threshold = other.checks.skip_threshold;
        }
        if other.checks.reduced_threshold != checks.reduced_threshold {
            self.checks.reduced_threshold = other.checks.reduced_threshold;
        }
        if other.checks.max_questions != checks.max_questions {
            self.checks.max_questions = other.checks.max_questions;
        }

        let hooks = HooksConfig::default();
        if other.hooks.write_tools != hooks.write_tools {
            self.hooks.write_tools = other.hooks.write_tools;
        }
        if other.hooks.read_tools != hooks.read_tools {
            self.hooks.read_tools = other.hooks.read_tools;
        }
        if other.hooks.block_decision != hooks.block_decision {
            if HooksConfig::is_valid_block_decision(&other.hooks.block_decision) {
                self.hooks.block_decision = other.hooks.block_decision;
            } else {
                tracing::warn!(
                    value = %other.hooks.block_decision,
                    "invalid hooks.block_decision in config, keeping '{}'",
                    self.hooks.block_decision
                );
            }
        }

        let questions = QuestionsConfig::default();
        if other.questions.source != questions.source {
            if QuestionsConfig::is_valid_source(&other.questions.source) {
                self.questions.source = other.questions.source;
            } else {
                tracing::warn!(
                    value = %other.questions.source,
                    "invalid questions.source in config, keeping '{}'",
                    self.questions.source
                );
            }
        }
        if other.questions.command.is_some() {
            self.questions.command = other.questions.command;
        }

        self
    }
}

/// Get the Grasp home directory.
///
/// Checks `GRASP_HOME` first, then falls back to `~/.grasp`. An empty
/// `GRASP_HOME` is ignored.
pub fn grasp_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("GRASP_HOME") {
        if home.is_empty() {
            tracing::warn!("GRASP_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("GRASP_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".grasp"));
    }

    let fallback_path = fallback_grasp_home();
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

#[cfg(unix)]
fn fallback_grasp_home() -> PathBuf {
    use std::os::unix::fs::MetadataExt;
    let uid = std::fs::metadata("/").map(|m| m.uid()).unwrap_or(0);
    PathBuf::from(format!("/tmp/grasp-{}", uid))
}

#[cfg(not(unix))]
fn fallback_grasp_home() -> PathBuf {
    std::env::temp_dir().join("grasp")
}

/// Get the record store directory: `<grasp_home>/store/`.
pub fn store_dir() -> Option<PathBuf> {
    grasp_home().map(|h| h.join("store"))
}

/// Get the crash log path: `<grasp_home>/crash.log`.
pub fn crash_log_path() -> Option<PathBuf> {
    grasp_home().map(|h| h.join("crash.log"))
}

/// Get the project config path: `<cwd>/.grasp/config.toml`.
pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(".grasp").join("config.toml")
}
