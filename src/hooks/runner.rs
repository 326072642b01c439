//! Hook runner for Grasp.
//!
//! Reads one host event, asks the gate for a verdict, and renders it. Every
//! handled path is fail-open: a broken store or malformed event yields a
//! silent allow, never an error the host would surface.

use std::io;

use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::core::gate::{Gate, HookPhase, ToolEvent};
use crate::error::{FailOpen, Result};
use crate::hooks::input::{parse_input, HookEvent};
use crate::hooks::output::{to_json, HookOutput};
use crate::storage::Store;
use crate::util::read_limited;

/// Hook type enumeration.
pub type HookType = HookPhase;

/// Hook runner context.
pub struct HookRunner<S: Store> {
    store: S,
    config: Config,
    clock: Box<dyn Clock>,
}

impl<S: Store> HookRunner<S> {
    /// Create a new hook runner on the system clock.
    pub fn new(store: S, config: Config) -> Self {
        Self::with_clock(store, config, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, config: Config, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Run a hook with input from stdin.
    ///
    /// `hook_type` overrides the event's own `hook_event_name`.
    pub fn run(&self, hook_type: Option<HookType>) -> Result<String> {
        let input = read_limited(io::stdin().lock()).fail_open_default("reading hook input");
        self.run_with_input(hook_type, &input)
    }

    /// Run a hook with provided input.
    ///
    /// Returns the JSON to print, or an empty string for a silent allow.
    pub fn run_with_input(&self, hook_type: Option<HookType>, input: &str) -> Result<String> {
        let Some(output) = self.handle(hook_type, input) else {
            return Ok(String::new());
        };
        to_json(&output)
    }

    fn handle(&self, hook_type: Option<HookType>, input: &str) -> Option<HookOutput> {
        let event: HookEvent = parse_input(input)
            .map(Some)
            .fail_open_with("parsing hook input", None)?;
        let phase = hook_type.or_else(|| HookPhase::parse(&event.hook_event_name))?;
        let tool_name = event.tool_name.as_deref()?;
        let tool_event = ToolEvent::classify(
            phase,
            tool_name,
            event.relative_file_path(),
            &self.config.hooks,
        )?;

        tracing::debug!(session = %event.session_id, tool = tool_name, ?tool_event, "hook event");

        let gate = Gate::new(&self.store, &self.config, self.clock.as_ref());
        let verdict = gate
            .evaluate(&tool_event)
            .map(Some)
            .fail_open_with("evaluating gate", None)?;
        HookOutput::from_verdict(verdict, phase, &self.config.hooks.block_decision)
    }
}
