//! Familiarity model.
//!
//! Turns typed interaction events into a bounded per-file score. There is
//! no decay: only interactions move the score.

use serde::{Deserialize, Serialize};

use crate::core::clock::Clock;
use crate::core::state::Familiarity;
use crate::error::Result;
use crate::storage::{Store, StoreExt};

/// Lower bound of a familiarity score.
pub const MIN_SCORE: f64 = 0.0;
/// Upper bound of a familiarity score.
pub const MAX_SCORE: f64 = 100.0;

/// Score deltas per interaction type.
pub mod deltas {
    pub const GENERATED: f64 = 1.0;
    pub const QUESTIONED: f64 = 3.0;
    pub const ANSWERED_CORRECTLY: f64 = 5.0;
    pub const ANSWERED_INCORRECTLY: f64 = 1.0;
    pub const MODIFIED: f64 = 4.0;
    pub const SKIPPED: f64 = -2.0;
    pub const DESIGN_DISCUSSED: f64 = 4.0;
}

/// A typed interaction between the developer and a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    /// The AI generated code in the file.
    Generated,
    /// A question about the file was put to the developer.
    Questioned,
    AnsweredCorrectly,
    AnsweredIncorrectly,
    /// The developer edited AI-authored code.
    Modified,
    Skipped,
    DesignDiscussed,
}

impl Interaction {
    pub const ALL: [Interaction; 7] = [
        Self::Generated,
        Self::Questioned,
        Self::AnsweredCorrectly,
        Self::AnsweredIncorrectly,
        Self::Modified,
        Self::Skipped,
        Self::DesignDiscussed,
    ];

    /// The score delta this interaction applies.
    pub fn delta(self) -> f64 {
        match self {
            Self::Generated => deltas::GENERATED,
            Self::Questioned => deltas::QUESTIONED,
            Self::AnsweredCorrectly => deltas::ANSWERED_CORRECTLY,
            Self::AnsweredIncorrectly => deltas::ANSWERED_INCORRECTLY,
            Self::Modified => deltas::MODIFIED,
            Self::Skipped => deltas::SKIPPED,
            Self::DesignDiscussed => deltas::DESIGN_DISCUSSED,
        }
    }
}

/// Apply a delta to a score, clamped to `[MIN_SCORE, MAX_SCORE]`.
pub fn apply_delta(score: f64, delta: f64) -> f64 {
    (score + delta).clamp(MIN_SCORE, MAX_SCORE)
}

/// Familiarity of one file as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileFamiliarity {
    pub file_path: String,
    pub score: f64,
    pub interactions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

/// Reads and updates familiarity records.
pub struct FamiliarityTracker<'a, S: Store + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: Store + ?Sized> FamiliarityTracker<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Record an interaction against a file and return the updated record.
    ///
    /// A missing record starts at score 0 with no interactions.
    pub fn apply(&self, file_path: &str, interaction: Interaction) -> Result<Familiarity> {
        let now = self.clock.now();
        let mut record = self
            .store
            .get::<Familiarity>(file_path)?
            .unwrap_or_else(|| Familiarity::empty(file_path, now));

        record.score = apply_delta(record.score, interaction.delta());
        record.interactions = record.interactions.saturating_add(1);
        record.last_interaction = now;
        if interaction == Interaction::Modified {
            record.modifications = record.modifications.saturating_add(1);
        }

        self.store.put(&record)?;
        tracing::debug!(
            file = file_path,
            ?interaction,
            score = record.score,
            "familiarity updated"
        );
        Ok(record)
    }

    /// Current score for a file, 0 if it has no record.
    pub fn score(&self, file_path: &str) -> Result<f64> {
        Ok(self
            .store
            .get::<Familiarity>(file_path)?
            .map(|f| f.score)
            .unwrap_or(MIN_SCORE))
    }

    /// Arithmetic mean over exactly the given paths.
    ///
    /// Paths without a record count as 0. An empty slice averages to 0.
    pub fn average(&self, file_paths: &[String]) -> Result<f64> {
        if file_paths.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for path in file_paths {
            total += self.score(path)?;
        }
        Ok(total / file_paths.len() as f64)
    }

    /// Per-file familiarity for the given paths, in input order.
    pub fn snapshot(&self, file_paths: &[String]) -> Result<Vec<FileFamiliarity>> {
        file_paths
            .iter()
            .map(|path| {
                let record = self.store.get::<Familiarity>(path)?;
                Ok(match record {
                    Some(f) => FileFamiliarity {
                        file_path: path.clone(),
                        score: f.score,
                        interactions: f.interactions,
                        last_seen: Some(f.last_interaction),
                    },
                    None => FileFamiliarity {
                        file_path: path.clone(),
                        score: MIN_SCORE,
                        interactions: 0,
                        last_seen: None,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::storage::MemoryStore;
    use chrono::{DateTime, Duration, Utc};

    fn start() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_delta_signs_and_ordering() {
        for interaction in Interaction::ALL {
            let delta = interaction.delta();
            if interaction == Interaction::Skipped {
                assert!(delta < 0.0);
            } else {
                assert!(delta > 0.0, "{:?} should be positive", interaction);
            }
        }
        assert!(Interaction::AnsweredCorrectly.delta() > Interaction::Modified.delta());
        assert!(Interaction::Modified.delta() > Interaction::Questioned.delta());
        assert!(Interaction::Questioned.delta() > Interaction::Generated.delta());
        assert_eq!(
            Interaction::DesignDiscussed.delta(),
            Interaction::Modified.delta()
        );
    }

    #[test]
    fn test_first_interaction_creates_record() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);

        let record = tracker.apply("src/x.ts", Interaction::Generated).unwrap();
        assert!((record.score - deltas::GENERATED).abs() < f64::EPSILON);
        assert_eq!(record.interactions, 1);
        assert_eq!(record.last_interaction, start());
    }

    #[test]
    fn test_first_negative_interaction_clamps_at_zero() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);

        let record = tracker.apply("src/x.ts", Interaction::Skipped).unwrap();
        assert_eq!(record.score, 0.0);
        assert_eq!(record.interactions, 1);
    }

    #[test]
    fn test_updates_accumulate() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);

        tracker.apply("a.rs", Interaction::Generated).unwrap();
        clock.advance(Duration::minutes(3));
        tracker.apply("a.rs", Interaction::AnsweredCorrectly).unwrap();
        let record = tracker.apply("a.rs", Interaction::Modified).unwrap();

        assert!((record.score - 10.0).abs() < f64::EPSILON);
        assert_eq!(record.interactions, 3);
        assert_eq!(record.modifications, 1);
        assert_eq!(record.last_interaction, start() + Duration::minutes(3));
    }

    #[test]
    fn test_score_clamped_at_max() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);

        let mut seeded = Familiarity::empty("hot.rs", start());
        seeded.score = 98.0;
        store.put(&seeded).unwrap();

        let record = tracker.apply("hot.rs", Interaction::AnsweredCorrectly).unwrap();
        assert_eq!(record.score, MAX_SCORE);
    }

    #[test]
    fn test_average_empty_is_zero() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);

        assert_eq!(tracker.average(&[]).unwrap(), 0.0);
        assert_eq!(
            tracker
                .average(&["none.rs".to_string(), "nope.rs".to_string()])
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn test_average_counts_missing_paths_as_zero() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);

        let mut known = Familiarity::empty("known.rs", start());
        known.score = 60.0;
        store.put(&known).unwrap();

        let avg = tracker
            .average(&["known.rs".to_string(), "unknown.rs".to_string()])
            .unwrap();
        assert!((avg - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_reports_missing_files() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(start());
        let tracker = FamiliarityTracker::new(&store, &clock);
        tracker.apply("a.rs", Interaction::Questioned).unwrap();

        let snapshot = tracker
            .snapshot(&["a.rs".to_string(), "b.rs".to_string()])
            .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].interactions, 1);
        assert_eq!(snapshot[0].last_seen, Some(start()));
        assert_eq!(snapshot[1].score, 0.0);
        assert!(snapshot[1].last_seen.is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn interaction() -> impl Strategy<Value = Interaction> {
            prop::sample::select(Interaction::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn apply_delta_stays_in_bounds(score in -50.0f64..150.0, delta in -500.0f64..500.0) {
                let result = apply_delta(score, delta);
                prop_assert!((MIN_SCORE..=MAX_SCORE).contains(&result));
            }

            #[test]
            fn any_interaction_sequence_stays_in_bounds(
                seed in 0.0f64..=100.0,
                events in prop::collection::vec(interaction(), 0..60),
            ) {
                let store = MemoryStore::new();
                let clock = FixedClock::new(start());
                let tracker = FamiliarityTracker::new(&store, &clock);

                let mut record = Familiarity::empty("f.rs", start());
                record.score = seed;
                store.put(&record).unwrap();

                for event in &events {
                    let updated = tracker.apply("f.rs", *event).unwrap();
                    prop_assert!(updated.score >= MIN_SCORE && updated.score <= MAX_SCORE);
                }
                let final_record: Familiarity = store.get("f.rs").unwrap().unwrap();
                prop_assert_eq!(final_record.interactions as usize, events.len());
            }
        }
    }
}
