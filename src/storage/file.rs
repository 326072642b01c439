//! File-based record storage for Grasp.
//!
//! Records are stored as JSON files in `~/.grasp/store/<collection>/`.
//! Atomic writes go through a per-write temp file and a rename, which makes
//! every single-key upsert last-writer-wins even across processes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::config::store_dir;
use crate::error::{GraspError, Result};
use crate::storage::{Collection, Store};

/// File-based record storage.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Root directory holding one subdirectory per collection.
    root: PathBuf,
}

impl FileStore {
    /// Create a new file store under the default directory.
    ///
    /// Uses `~/.grasp/store/` or `$GRASP_HOME/store/`.
    pub fn new() -> Result<Self> {
        let dir = store_dir().ok_or_else(|| {
            GraspError::config("Could not determine store directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a new file store with a custom root directory.
    pub fn with_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        for collection in Collection::ALL {
            let dir = root.join(collection.as_str());
            if !dir.exists() {
                fs::create_dir_all(&dir).map_err(|e| GraspError::storage(&dir, e))?;
            }
        }

        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn record_path(&self, collection: Collection, key: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", encode_key(key)))
    }
}

impl Store for FileStore {
    fn read(&self, collection: Collection, key: &str) -> Result<Option<String>> {
        let path = self.record_path(collection, key);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| GraspError::storage(&path, e))?;
        Ok(Some(content))
    }

    fn write(&self, collection: Collection, key: &str, document: &str) -> Result<()> {
        let dir = self.collection_dir(collection);
        let final_path = self.record_path(collection, key);

        let mut temp = Builder::new()
            .prefix(".")
            .suffix(".json.tmp")
            .tempfile_in(&dir)
            .map_err(|e| GraspError::storage(&dir, e))?;
        temp.write_all(document.as_bytes())
            .map_err(|e| GraspError::storage(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| GraspError::storage(temp.path(), e))?;

        temp.persist(&final_path)
            .map_err(|e| GraspError::storage(&final_path, e.error))?;

        Ok(())
    }

    fn scan(&self, collection: Collection) -> Result<Vec<String>> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| GraspError::storage(&dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| GraspError::storage(&dir, e))?;
            let path = entry.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            match fs::read_to_string(&path) {
                Ok(content) => documents.push(content),
                Err(err) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable record: {}", err)
                }
            }
        }

        Ok(documents)
    }
}

/// Longest encoded key used verbatim as a file stem.
const MAX_ENCODED_KEY_LEN: usize = 200;

/// Bytes of the encoded key kept in front of the hash for long keys.
const LONG_KEY_PREFIX_LEN: usize = 120;

/// Encode a record key as a single safe file name.
///
/// ASCII alphanumerics plus `-` and `_` pass through; every other byte
/// becomes `%XX`. Encodings longer than `MAX_ENCODED_KEY_LEN` are cut to a
/// readable prefix followed by `~` and the BLAKE3 hash of the raw key. `~`
/// never appears in a short encoding, so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    if encoded.len() <= MAX_ENCODED_KEY_LEN {
        return encoded;
    }

    let mut cut = LONG_KEY_PREFIX_LEN;
    // Keep `%XX` escapes whole.
    if let Some(pos) = encoded[cut.saturating_sub(2)..cut].find('%') {
        cut = cut - 2 + pos;
    }
    format!(
        "{}~{}",
        &encoded[..cut],
        blake3::hash(key.as_bytes()).to_hex()
    )
}
