//! Read-only lookups: why a file looks the way it does, and how well the
//! developer knows a set of files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::core::familiarity::FamiliarityTracker;
use crate::core::state::ReviewScope;
use crate::error::Result;
use crate::storage::queries;
use crate::storage::Store;
use crate::util::relative_time;

/// Recommendation for a familiarity level.
pub fn recommendation(average_familiarity: f64) -> &'static str {
    if average_familiarity > 70.0 {
        "Developer knows this area. Generate efficiently."
    } else if average_familiarity > 40.0 {
        "Moderate familiarity. Explain key design decisions."
    } else {
        "Unfamiliar territory. Generate in small chunks, explain everything, ask comprehension questions."
    }
}

/// A stored rationale for a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub chunk_id: String,
    pub task_id: String,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
    pub age: String,
}

/// Answer to "why was this written this way?"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WhyReport {
    pub file_path: String,
    pub familiarity: f64,
    /// Newest first.
    pub decisions: Vec<Decision>,
}

impl WhyReport {
    pub fn render(&self) -> String {
        if self.decisions.is_empty() {
            return format!("No design decisions recorded for {}.", self.file_path);
        }
        let mut lines = vec![
            self.file_path.clone(),
            format!("Familiarity: {:.0}/100", self.familiarity),
            String::new(),
            "Design decisions:".to_string(),
        ];
        for decision in &self.decisions {
            lines.push(format!("  - \"{}\" ({})", decision.explanation, decision.age));
        }
        lines.join("\n")
    }
}

/// A design-review answer that touched a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignNote {
    pub scope: ReviewScope,
    pub response: String,
}

/// Everything known about one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileContext {
    pub file_path: String,
    pub score: f64,
    pub interactions: u32,
    pub last_seen: Option<DateTime<Utc>>,
    pub explanations: Vec<String>,
    pub design_notes: Vec<DesignNote>,
}

/// Familiarity briefing for a set of files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextReport {
    pub files: Vec<FileContext>,
    pub average_familiarity: u32,
    pub recommendation: String,
}

/// Rationale and familiarity lookups.
pub struct Lookup<'a, S: Store + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: Store + ?Sized> Lookup<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn why(&self, file_path: &str) -> Result<WhyReport> {
        let now = self.clock.now();
        let familiarity = FamiliarityTracker::new(self.store, self.clock).score(file_path)?;
        let decisions = queries::chunks_for_file(self.store, file_path)?
            .into_iter()
            .map(|chunk| Decision {
                age: relative_time(chunk.created_at, now),
                chunk_id: chunk.id,
                task_id: chunk.task_id,
                explanation: chunk.explanation,
                created_at: chunk.created_at,
            })
            .collect();

        Ok(WhyReport {
            file_path: file_path.to_string(),
            familiarity,
            decisions,
        })
    }

    pub fn context(&self, file_paths: &[String]) -> Result<ContextReport> {
        let tracker = FamiliarityTracker::new(self.store, self.clock);
        let average = tracker.average(file_paths)?;

        let mut files = Vec::with_capacity(file_paths.len());
        for snapshot in tracker.snapshot(file_paths)? {
            let explanations = queries::chunks_for_file(self.store, &snapshot.file_path)?
                .into_iter()
                .map(|c| c.explanation)
                .collect();
            let design_notes = queries::reviews_for_file(self.store, &snapshot.file_path)?
                .into_iter()
                .filter_map(|r| {
                    r.developer_response.map(|response| DesignNote {
                        scope: r.scope,
                        response,
                    })
                })
                .collect();
            files.push(FileContext {
                file_path: snapshot.file_path,
                score: snapshot.score,
                interactions: snapshot.interactions,
                last_seen: snapshot.last_seen,
                explanations,
                design_notes,
            });
        }

        Ok(ContextReport {
            files,
            average_familiarity: average.round() as u32,
            recommendation: recommendation(average).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::state::{Chunk, DesignReview, Familiarity};
    use crate::storage::{MemoryStore, StoreExt};
    use chrono::Duration;

    fn start() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_recommendation_tiers() {
        assert!(recommendation(71.0).starts_with("Developer knows"));
        assert!(recommendation(70.0).starts_with("Moderate"));
        assert!(recommendation(41.0).starts_with("Moderate"));
        assert!(recommendation(40.0).starts_with("Unfamiliar"));
    }

    #[test]
    fn test_why_newest_first_with_ages() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        store
            .put(&Chunk::new("t", "a", "first pass", start()).with_file(Some("x.rs".into())))
            .unwrap();
        store
            .put(
                &Chunk::new("t", "b", "switched to streaming", start() + Duration::hours(2))
                    .with_file(Some("x.rs".into())),
            )
            .unwrap();
        clock.advance(Duration::hours(26));

        let report = Lookup::new(&store, &clock).why("x.rs").unwrap();
        assert_eq!(report.decisions.len(), 2);
        assert_eq!(report.decisions[0].explanation, "switched to streaming");
        assert_eq!(report.decisions[0].age, "1d ago");
        assert_eq!(report.decisions[1].age, "1d ago");
        assert!(report.render().contains("\"first pass\" (1d ago)"));
    }

    #[test]
    fn test_why_without_history() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let report = Lookup::new(&store, &clock).why("nothing.rs").unwrap();
        assert!(report.decisions.is_empty());
        assert_eq!(report.render(), "No design decisions recorded for nothing.rs.");
    }

    #[test]
    fn test_context_collects_per_file() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());

        let mut known = Familiarity::empty("known.rs", start());
        known.score = 80.0;
        known.interactions = 12;
        store.put(&known).unwrap();
        store
            .put(&Chunk::new("t", "a", "cache layer", start()).with_file(Some("known.rs".into())))
            .unwrap();
        let mut review = DesignReview::new(
            "t",
            ReviewScope::TradeOffs,
            Some(vec!["known.rs".into()]),
            start(),
        );
        review.developer_response = Some("memory over latency".into());
        store.put(&review).unwrap();
        store
            .put(&DesignReview::new(
                "t",
                ReviewScope::Approach,
                Some(vec!["known.rs".into()]),
                start(),
            ))
            .unwrap();

        let paths = vec!["known.rs".to_string(), "new.rs".to_string()];
        let report = Lookup::new(&store, &clock).context(&paths).unwrap();

        assert_eq!(report.average_familiarity, 40);
        assert!(report.recommendation.starts_with("Unfamiliar"));
        assert_eq!(report.files[0].interactions, 12);
        assert_eq!(report.files[0].explanations, ["cache layer"]);
        assert_eq!(report.files[0].design_notes.len(), 1);
        assert_eq!(report.files[0].design_notes[0].response, "memory over latency");
        assert_eq!(report.files[1].score, 0.0);
        assert!(report.files[1].last_seen.is_none());
    }

    #[test]
    fn test_context_empty() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let report = Lookup::new(&store, &clock).context(&[]).unwrap();
        assert!(report.files.is_empty());
        assert_eq!(report.average_familiarity, 0);
    }
}
