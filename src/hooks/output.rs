//! Hook output types for host editor integration.
//!
//! A silent allow prints nothing. Everything else is one JSON object:
//! `{continue, systemMessage?, hookSpecificOutput?}`.

use serde::{Deserialize, Serialize};

use crate::core::gate::{GateVerdict, HookPhase};
use crate::error::{GraspError, Result};

/// Permission decision for a pre-tool-use event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    Deny,
    /// Defer to the developer.
    Ask,
}

impl PermissionDecision {
    /// Decision used for blocking verdicts, from `hooks.block_decision`.
    pub fn for_block(block_decision: &str) -> Self {
        match block_decision {
            "ask" => Self::Ask,
            _ => Self::Deny,
        }
    }
}

/// Event-specific part of the output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

/// Output for a tool-use hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    #[serde(rename = "continue")]
    pub continue_: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    /// An output that only shows the agent a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            continue_: true,
            system_message: Some(message.into()),
            hook_specific_output: None,
        }
    }

    /// An output that attaches context to the tool result.
    pub fn with_context(phase: HookPhase, context: impl Into<String>) -> Self {
        Self {
            continue_: true,
            system_message: None,
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: phase.as_str().to_string(),
                additional_context: Some(context.into()),
                ..Default::default()
            }),
        }
    }

    /// A blocking output with a machine-readable reason.
    pub fn block(decision: PermissionDecision, reason: impl Into<String>) -> Self {
        Self {
            continue_: true,
            system_message: None,
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: HookPhase::PreToolUse.as_str().to_string(),
                permission_decision: Some(decision),
                permission_decision_reason: Some(reason.into()),
                additional_context: None,
            }),
        }
    }

    /// Render a gate verdict. `None` means print nothing.
    pub fn from_verdict(
        verdict: GateVerdict,
        phase: HookPhase,
        block_decision: &str,
    ) -> Option<Self> {
        match verdict {
            GateVerdict::AllowSilent => None,
            GateVerdict::AllowWithContext(message) => Some(match phase {
                HookPhase::PreToolUse => Self::with_message(message),
                HookPhase::PostToolUse => Self::with_context(phase, message),
            }),
            GateVerdict::Deny(reason) => Some(Self::block(
                PermissionDecision::for_block(block_decision),
                reason,
            )),
        }
    }
}

/// Serialize output to JSON.
pub fn to_json<T: Serialize>(output: &T) -> Result<String> {
    serde_json::to_string(output)
        .map_err(|e| GraspError::serde(format!("Failed to serialize output: {}", e)))
}
