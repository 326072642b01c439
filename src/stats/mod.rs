//! Comprehension scoring for Grasp.
//!
//! `scoring` holds the pure coverage/engagement math; `aggregate` applies it
//! to the store and keeps one snapshot per day.

pub mod aggregate;
pub mod scoring;

pub use aggregate::{ComprehensionScore, RawCounts, ScoreAggregator};
pub use scoring::{overall, score_message, weights, CheckCounts, CoverageCounts};
