//! Core types and logic for Grasp.
//!
//! Record types, the familiarity model, and the workflows the agent drives:
//! task lifecycle, design review, comprehension checks, and the write gate.

pub mod check;
pub mod clock;
pub mod design;
pub mod familiarity;
pub mod gate;
pub mod lookup;
pub mod questions;
pub mod state;
pub mod tasks;

pub use check::{AnswerRecorded, CheckRequest, CheckWorkflow, ChunkSummary, OpenCheck};
pub use clock::{Clock, FixedClock, SystemClock};
pub use design::{DesignReviewWorkflow, OpenScope, RecapEntry, ReviewRequest, ReviewResponse};
pub use familiarity::{FamiliarityTracker, FileFamiliarity, Interaction};
pub use gate::{Gate, GateVerdict, HookPhase, ToolEvent};
pub use lookup::{ContextReport, Lookup, WhyReport};
pub use questions::{CommandGenerator, QuestionGenerator, TextGenerator};
pub use state::{
    AnswerQuality, Check, Chunk, DesignReview, Familiarity, Mode, QuestionType, ReviewScope,
    ScoreRecord, Task, PENDING_QUESTION,
};
pub use tasks::{ChunkLogged, ChunkRequest, LineageEntry, TaskLifecycle, TaskStarted};
