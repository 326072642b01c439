//! Lookup commands for Grasp.
//!
//! `why` explains a file from its stored rationale; `context` briefs the
//! agent on how well the developer knows a set of files.

use crate::cli::{CommandOutput, Render};
use crate::core::clock::{Clock, SystemClock};
use crate::core::lookup::{ContextReport, Lookup, WhyReport};
use crate::core::state::dedup_paths;
use crate::storage::Store;

impl Render for WhyReport {
    fn render(&self) -> String {
        WhyReport::render(self)
    }
}

impl Render for ContextReport {
    fn render(&self) -> String {
        let mut lines = vec![
            format!("Average familiarity: {}/100", self.average_familiarity),
            self.recommendation.clone(),
        ];
        for file in &self.files {
            lines.push(String::new());
            let seen = match file.last_seen {
                Some(at) => format!(", last seen {}", at.format("%Y-%m-%d %H:%M UTC")),
                None => String::new(),
            };
            lines.push(format!(
                "{}: {:.0}/100 ({} interactions{})",
                file.file_path, file.score, file.interactions, seen
            ));
            for explanation in &file.explanations {
                lines.push(format!("  - {}", explanation));
            }
            for note in &file.design_notes {
                lines.push(format!("  Design [{}]: {}", note.scope.as_str(), note.response));
            }
        }
        lines.join("\n")
    }
}

/// The lookup command implementation.
pub struct LookupCommand<S: Store> {
    store: S,
    clock: Box<dyn Clock>,
}

impl<S: Store> LookupCommand<S> {
    /// Create a new lookup command on the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Box<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn lookup(&self) -> Lookup<'_, S> {
        Lookup::new(&self.store, self.clock.as_ref())
    }

    pub fn why(&self, file_path: &str) -> CommandOutput<WhyReport> {
        self.lookup().why(file_path).into()
    }

    pub fn context(&self, file_paths: Vec<String>) -> CommandOutput<ContextReport> {
        self.lookup().context(&dedup_paths(file_paths)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputOptions;
    use crate::core::clock::FixedClock;
    use crate::core::state::{Chunk, DesignReview, Familiarity, ReviewScope};
    use crate::storage::{MemoryStore, StoreExt};
    use chrono::{DateTime, Duration, Utc};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, LookupCommand<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let cmd = LookupCommand::with_clock(
            Arc::clone(&store),
            Box::new(FixedClock::new(start() + Duration::hours(3))),
        );
        (store, cmd)
    }

    #[test]
    fn test_why_without_history() {
        let (_, cmd) = setup();
        let text = cmd.why("src/none.rs").format(&OutputOptions::default());
        assert_eq!(text, "No design decisions recorded for src/none.rs.");
    }

    #[test]
    fn test_why_lists_decisions_with_age() {
        let (store, cmd) = setup();
        store
            .put(
                &Chunk::new("t", "x", "retry budget caps load", start())
                    .with_file(Some("src/retry.rs".into())),
            )
            .unwrap();

        let text = cmd.why("src/retry.rs").format(&OutputOptions::default());
        assert!(text.contains("\"retry budget caps load\" (3h ago)"));
    }

    #[test]
    fn test_context_renders_files_and_notes() {
        let (store, cmd) = setup();
        let mut familiar = Familiarity::empty("src/a.rs", start());
        familiar.score = 50.0;
        familiar.interactions = 4;
        store.put(&familiar).unwrap();
        store
            .put(&Chunk::new("t", "x", "uses a slab", start()).with_file(Some("src/a.rs".into())))
            .unwrap();
        let mut review = DesignReview::new(
            "t",
            ReviewScope::TradeOffs,
            Some(vec!["src/a.rs".into()]),
            start(),
        );
        review.developer_response = Some("memory over speed".into());
        store.put(&review).unwrap();

        let output = cmd.context(vec!["src/a.rs".into(), "src/a.rs".into(), "src/b.rs".into()]);
        let report = output.result.clone().unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.average_familiarity, 25);

        let text = output.format(&OutputOptions::default());
        assert!(text.starts_with("Average familiarity: 25/100"));
        assert!(text.contains("src/a.rs: 50/100 (4 interactions, last seen 2026-03-01 12:00 UTC)"));
        assert!(text.contains("  - uses a slab"));
        assert!(text.contains("  Design [trade_offs]: memory over speed"));
        assert!(text.contains("src/b.rs: 0/100 (0 interactions)"));
    }
}
