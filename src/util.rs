//! Utility functions for Grasp.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{GraspError, Result};

/// Maximum size of a code file or stdin payload read into memory (10 MB).
pub const MAX_INPUT_SIZE: u64 = 10 * 1024 * 1024;

/// Human-readable age of `then` relative to `now`.
///
/// Future timestamps read as "just now".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes().max(0);
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// Read a file into a string, refusing anything over `MAX_INPUT_SIZE`.
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| GraspError::storage(path, e))?;

    let size = metadata.len();
    if size > MAX_INPUT_SIZE {
        return Err(GraspError::invalid_input(format!(
            "{} is too large ({} bytes, max {} bytes)",
            path.display(),
            size,
            MAX_INPUT_SIZE
        )));
    }

    fs::read_to_string(path).map_err(|e| GraspError::storage(path, e))
}

/// Read a reader to the end, refusing more than `MAX_INPUT_SIZE` bytes.
pub fn read_limited<R: Read>(reader: R) -> Result<String> {
    let mut buf = String::new();
    let read = reader
        .take(MAX_INPUT_SIZE + 1)
        .read_to_string(&mut buf)
        .map_err(|e| GraspError::invalid_input(format!("failed to read input: {}", e)))?;
    if read as u64 > MAX_INPUT_SIZE {
        return Err(GraspError::invalid_input(format!(
            "input is too large (max {} bytes)",
            MAX_INPUT_SIZE
        )));
    }
    Ok(buf)
}
