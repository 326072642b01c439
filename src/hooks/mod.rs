//! Hook integration for the host editor.
//!
//! The host invokes `grasp hook` around every tool call:
//!
//! - **pre-tool-use**: write gating and workflow reminders
//! - **post-tool-use**: modification tracking and read-time context

pub mod input;
pub mod output;
pub mod runner;

pub use input::{parse_input, HookEvent};
pub use output::{to_json, HookOutput, HookSpecificOutput, PermissionDecision};
pub use runner::{HookRunner, HookType};
