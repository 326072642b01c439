//! Record storage for Grasp.
//!
//! Tasks, chunks, checks, design reviews, familiarity and daily score
//! snapshots live in one keyed document store with file-based and
//! in-memory backends.

pub mod file;
pub mod memory;
pub mod queries;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{Collection, Record, Store, StoreExt};
