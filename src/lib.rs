//! Grasp - Comprehension tracking gate for AI-generated code
//!
//! Grasp sits between a coding agent and the developer. It records why each
//! block of generated code exists, keeps a per-file familiarity score, asks
//! design questions before code is written and comprehension questions
//! after, and tells the host editor when a write should wait for either.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod hooks;
pub mod stats;
pub mod storage;
pub mod util;

pub use config::Config;
pub use core::{
    Check, Chunk, Clock, DesignReview, Familiarity, FamiliarityTracker, Gate, GateVerdict, Mode,
    Task,
};
pub use error::{GraspError, Result};
pub use stats::{ComprehensionScore, ScoreAggregator};
pub use storage::{FileStore, MemoryStore, Store, StoreExt};

// CLI commands
pub use cli::{CheckCommand, DesignCommand, LookupCommand, ScoreCommand, TaskCommand};
