//! Binary payload store.
//!
//! Image payloads never travel inside the JSON history record; they live
//! behind a [`BlobStore`] keyed by opaque string ids. Two backends ship:
//! an in-memory map for tests and storage-less sessions, and a directory
//! of flat files for real persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::{StorageError, StorageResult};

/// Extension used for payload files in a [`FileBlobStore`] directory.
const BLOB_EXT: &str = "bin";

/// A stored payload with its bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredBlob {
    /// Key the payload is stored under.
    pub id: String,
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// Store time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Keyed binary payload storage.
///
/// All methods are infallible from the caller's perspective in the sense
/// that a missing key is `Ok(None)` / `Ok(false)`, never an error; `Err`
/// means the backend itself misbehaved.
pub trait BlobStore: Send + Sync {
    /// Fetch a payload by id. `Ok(None)` when the id is unknown.
    fn get(&self, id: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store a payload, returning the id it was stored under.
    ///
    /// Passing `Some(id)` stores under (or overwrites) that key; `None`
    /// generates a fresh id via [`generate_blob_id`].
    fn set(&self, data: &[u8], id: Option<&str>) -> StorageResult<String>;

    /// Remove a payload. `Ok(false)` when the id was not present.
    fn delete(&self, id: &str) -> StorageResult<bool>;

    /// Remove every stored payload.
    fn clear(&self) -> StorageResult<()>;

    /// All ids currently stored, in no particular order.
    fn list_keys(&self) -> StorageResult<Vec<String>>;
}

/// Generate a fresh blob id: `img_{epoch_millis}_{9 random alphanumerics}`.
pub fn generate_blob_id() -> String {
    let millis = epoch_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("img_{millis}_{suffix}")
}

/// Whether an id is safe to use as a storage key.
///
/// File-backed stores map ids to file names, so only alphanumerics,
/// underscores and hyphens are allowed.
fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// In-memory blob store backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, id: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(id).map(|b| b.data.clone()))
    }

    fn set(&self, data: &[u8], id: Option<&str>) -> StorageResult<String> {
        let id = match id {
            Some(id) if valid_id(id) => id.to_string(),
            Some(id) => {
                return Err(StorageError::InvalidRecord {
                    reason: format!("blob id contains unsupported characters: {id:?}"),
                })
            }
            None => generate_blob_id(),
        };
        let blob = StoredBlob {
            id: id.clone(),
            data: data.to_vec(),
            timestamp: epoch_millis(),
        };
        self.blobs.lock().insert(id.clone(), blob);
        debug!(blob_id = %id, bytes = data.len(), "Stored blob in memory");
        Ok(id)
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        Ok(self.blobs.lock().remove(id).is_some())
    }

    fn clear(&self) -> StorageResult<()> {
        self.blobs.lock().clear();
        Ok(())
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.lock().keys().cloned().collect())
    }
}

/// Blob store keeping each payload as one flat file under a root directory.
///
/// Writes are atomic: the payload goes to a `.tmp` sibling first and is
/// renamed into place, so a crash mid-write never leaves a truncated blob
/// under a live id.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open (creating if needed) a blob directory.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            error!(path = %root.display(), error = %e, "Failed to create blob directory");
            StorageError::Unavailable {
                reason: format!("cannot create blob directory {}: {e}", root.display()),
            }
        })?;
        Ok(Self { root })
    }

    /// Directory the payloads live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{BLOB_EXT}"))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, id: &str) -> StorageResult<Option<Vec<u8>>> {
        if !valid_id(id) {
            return Ok(None);
        }
        match std::fs::read(self.blob_path(id)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set(&self, data: &[u8], id: Option<&str>) -> StorageResult<String> {
        let id = match id {
            Some(id) if valid_id(id) => id.to_string(),
            Some(id) => {
                return Err(StorageError::InvalidRecord {
                    reason: format!("blob id contains unsupported characters: {id:?}"),
                })
            }
            None => generate_blob_id(),
        };
        let path = self.blob_path(&id);
        let temp_path = path.with_extension(format!("{BLOB_EXT}.tmp"));

        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, &path).map_err(|e| {
            // Rename failed; drop the temp file on a best-effort basis.
            let _ = std::fs::remove_file(&temp_path);
            error!(
                from = %temp_path.display(),
                to = %path.display(),
                error = %e,
                "Failed to rename temp blob file"
            );
            StorageError::Io(e)
        })?;

        debug!(blob_id = %id, bytes = data.len(), "Stored blob file");
        Ok(id)
    }

    fn delete(&self, id: &str) -> StorageResult<bool> {
        if !valid_id(id) {
            return Ok(false);
        }
        match std::fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn clear(&self) -> StorageResult<()> {
        for id in self.list_keys()? {
            if let Err(e) = self.delete(&id) {
                warn!(blob_id = %id, error = %e, "Failed to delete blob during clear");
            }
        }
        Ok(())
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}
