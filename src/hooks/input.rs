//! Hook input types for host editor integration.
//!
//! The host passes one JSON event per intercepted tool call on stdin.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraspError, Result};

/// Keys under `tool_input` that may carry the target file.
const FILE_PATH_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

/// A tool-use event from the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HookEvent {
    /// Unique session identifier.
    #[serde(default)]
    pub session_id: String,
    /// `PreToolUse` or `PostToolUse`.
    #[serde(default)]
    pub hook_event_name: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    /// The tool input (as JSON value).
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    /// Working directory of the session.
    #[serde(default)]
    pub cwd: Option<String>,
}

impl HookEvent {
    pub fn new(session_id: impl Into<String>, hook_event_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            hook_event_name: hook_event_name.into(),
            tool_name: None,
            tool_input: None,
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, tool_input: serde_json::Value) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_input = Some(tool_input);
        self
    }

    /// The file the tool targets, if the input names one.
    pub fn file_path(&self) -> Option<String> {
        let input = self.tool_input.as_ref()?;
        FILE_PATH_KEYS
            .iter()
            .filter_map(|key| input.get(key).and_then(|v| v.as_str()))
            .find(|path| !path.is_empty())
            .map(str::to_string)
    }

    /// The target file as agents log it: relative to `cwd` when inside it.
    ///
    /// Paths outside the working directory are returned unchanged.
    pub fn relative_file_path(&self) -> Option<String> {
        let path = self.file_path()?;
        let relative = self
            .cwd
            .as_deref()
            .and_then(|cwd| Path::new(&path).strip_prefix(cwd).ok())
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| rel.to_string_lossy().into_owned());
        Some(relative.unwrap_or(path))
    }
}

/// Parse hook input from JSON.
pub fn parse_input<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| GraspError::serde(format!("Failed to parse hook input: {}", e)))
}
