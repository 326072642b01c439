//! Comprehension scoring.
//!
//! Pure functions over chunks and checks. Scores are percentages:
//!
//! - Coverage: AI-touched files that carry a real rationale.
//! - Engagement: active checks that were answered rather than skipped.
//! - Overall: weighted blend, rounded and clamped to `[0, 100]`.

use std::collections::BTreeMap;

use crate::core::state::{Check, Chunk};

/// Weights for the overall score.
pub mod weights {
    /// Weight for coverage.
    pub const COVERAGE: f64 = 0.6;
    /// Weight for engagement.
    pub const ENGAGEMENT: f64 = 0.4;
}

/// Explanations must be longer than this to count as context.
pub const MIN_EXPLANATION_LEN: usize = 10;

/// File counts behind a coverage figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageCounts {
    pub files_touched: usize,
    pub files_with_context: usize,
}

impl CoverageCounts {
    /// Count distinct non-null file paths and those with any long explanation.
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Self {
        let mut files: BTreeMap<&str, bool> = BTreeMap::new();
        for chunk in chunks {
            let Some(path) = chunk.file_path.as_deref() else {
                continue;
            };
            let explained = chunk.explanation.chars().count() > MIN_EXPLANATION_LEN;
            *files.entry(path).or_insert(false) |= explained;
        }
        Self {
            files_touched: files.len(),
            files_with_context: files.values().filter(|explained| **explained).count(),
        }
    }

    /// Coverage percentage, 0 when no files were touched.
    pub fn percent(&self) -> f64 {
        if self.files_touched == 0 {
            return 0.0;
        }
        self.files_with_context as f64 / self.files_touched as f64 * 100.0
    }
}

/// Check counts behind an engagement figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    /// Answered or skipped.
    pub active: usize,
    pub answered: usize,
    pub passed: usize,
    pub skipped: usize,
}

impl CheckCounts {
    /// Count checks. Abandoned placeholders are excluded everywhere.
    pub fn from_checks<'a>(checks: impl IntoIterator<Item = &'a Check>) -> Self {
        let mut counts = Self::default();
        for check in checks.into_iter().filter(|c| c.is_active()) {
            counts.active += 1;
            if check.skipped {
                counts.skipped += 1;
            } else if check.is_answered() {
                counts.answered += 1;
            }
            if check.is_passed() {
                counts.passed += 1;
            }
        }
        counts
    }

    /// Engagement percentage, 100 when there are no active checks.
    pub fn percent(&self) -> f64 {
        if self.active == 0 {
            return 100.0;
        }
        self.answered as f64 / self.active as f64 * 100.0
    }
}

/// Weighted overall score.
pub fn overall(coverage_pct: f64, engagement_pct: f64) -> u32 {
    let blended = weights::COVERAGE * coverage_pct + weights::ENGAGEMENT * engagement_pct;
    blended.round().clamp(0.0, 100.0) as u32
}

/// Message tier for a score.
pub fn score_message(overall: u32, questions_total: usize) -> &'static str {
    if questions_total == 0 {
        "No comprehension data yet. Start coding with Grasp to build your profile."
    } else if overall >= 80 {
        "Strong comprehension. You own this code."
    } else if overall >= 60 {
        "Good understanding. Some areas could use deeper engagement."
    } else if overall >= 40 {
        "Moderate comprehension. Consider slowing down on unfamiliar areas."
    } else {
        "Low comprehension score. Take time to understand the code being generated."
    }
}
