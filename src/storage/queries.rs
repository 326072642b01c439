//! Cross-record queries over a `Store`.
//!
//! The store has no indexes, so these scan a collection and filter. Results
//! come back in a stable order: oldest first unless noted, ties broken by id
//! (ids are monotonic ULIDs).

use chrono::{DateTime, Duration, Utc};

use crate::core::state::{Check, Chunk, DesignReview, Task};
use crate::error::Result;
use crate::storage::{Store, StoreExt};

/// Chunks belonging to a task, oldest first.
pub fn chunks_for_task<S: Store + ?Sized>(store: &S, task_id: &str) -> Result<Vec<Chunk>> {
    let mut chunks: Vec<Chunk> = store
        .all::<Chunk>()?
        .into_iter()
        .filter(|c| c.task_id == task_id)
        .collect();
    chunks.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    Ok(chunks)
}

/// Checks belonging to a task, oldest first.
pub fn checks_for_task<S: Store + ?Sized>(store: &S, task_id: &str) -> Result<Vec<Check>> {
    let mut checks: Vec<Check> = store
        .all::<Check>()?
        .into_iter()
        .filter(|c| c.task_id == task_id)
        .collect();
    checks.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    Ok(checks)
}

/// Design reviews belonging to a task, oldest first.
pub fn reviews_for_task<S: Store + ?Sized>(
    store: &S,
    task_id: &str,
) -> Result<Vec<DesignReview>> {
    let mut reviews: Vec<DesignReview> = store
        .all::<DesignReview>()?
        .into_iter()
        .filter(|r| r.task_id == task_id)
        .collect();
    reviews.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    Ok(reviews)
}

/// Number of answered design reviews for a task.
pub fn completed_review_count<S: Store + ?Sized>(store: &S, task_id: &str) -> Result<usize> {
    Ok(reviews_for_task(store, task_id)?
        .iter()
        .filter(|r| r.is_completed())
        .count())
}

/// Chunks recorded against a file, newest first.
pub fn chunks_for_file<S: Store + ?Sized>(store: &S, file_path: &str) -> Result<Vec<Chunk>> {
    let mut chunks: Vec<Chunk> = store
        .all::<Chunk>()?
        .into_iter()
        .filter(|c| c.file_path.as_deref() == Some(file_path))
        .collect();
    chunks.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
    Ok(chunks)
}

/// Whether any chunk has been recorded against a file.
pub fn has_chunks_for_file<S: Store + ?Sized>(store: &S, file_path: &str) -> Result<bool> {
    Ok(store
        .all::<Chunk>()?
        .iter()
        .any(|c| c.file_path.as_deref() == Some(file_path)))
}

/// Design reviews whose attached paths include a file, newest first.
pub fn reviews_for_file<S: Store + ?Sized>(
    store: &S,
    file_path: &str,
) -> Result<Vec<DesignReview>> {
    let mut reviews: Vec<DesignReview> = store
        .all::<DesignReview>()?
        .into_iter()
        .filter(|r| r.paths().iter().any(|p| p == file_path))
        .collect();
    reviews.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
    Ok(reviews)
}

/// The most recently started task within `window` of `now`.
///
/// Tasks started in the future relative to `now` are ignored, as are tasks
/// older than the window. Completion status does not matter here.
pub fn most_recent_task<S: Store + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Option<Task>> {
    let cutoff = now - window;
    Ok(store
        .all::<Task>()?
        .into_iter()
        .filter(|t| t.started_at > cutoff && t.started_at <= now)
        .max_by(|a, b| (a.started_at, &a.id).cmp(&(b.started_at, &b.id))))
}
