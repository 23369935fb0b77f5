//! Persistence gateway between the in-memory history and durable storage.
//!
//! The gateway owns the split representation: history records are JSON-safe
//! (image payloads replaced by blob-store ids) while the payload bytes live
//! in a [`BlobStore`]. Every surface degrades instead of failing — `save`
//! returns `bool`, `load` returns `Option` — so a broken disk never blocks
//! editing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use caplab_editor_state::{DocumentSnapshot, HistoryEntry, HistoryState, ImageAsset, ImageHandle};

use crate::blob::{BlobStore, FileBlobStore};
use crate::error::{StorageError, StorageResult};

/// File name of the JSON history record inside a gateway directory.
const RECORD_FILE: &str = "history.json";
/// Subdirectory holding image payload files.
const BLOB_DIR: &str = "images";

/// Durable storage front for one document's history.
pub struct PersistenceGateway {
    blobs: Arc<dyn BlobStore>,
    record_path: PathBuf,
}

impl PersistenceGateway {
    /// Gateway over an explicit blob store and record path.
    pub fn new(blobs: Arc<dyn BlobStore>, record_path: impl Into<PathBuf>) -> Self {
        Self {
            blobs,
            record_path: record_path.into(),
        }
    }

    /// Open a file-backed gateway rooted at `dir`.
    ///
    /// Creates `dir` and its blob subdirectory if missing. Failure here is
    /// the storage-unavailable case; callers fall back to memory-only.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| StorageError::Unavailable {
            reason: format!("cannot create storage directory {}: {e}", dir.display()),
        })?;
        let blobs = FileBlobStore::open(dir.join(BLOB_DIR))?;
        Ok(Self::new(Arc::new(blobs), dir.join(RECORD_FILE)))
    }

    /// The underlying blob store.
    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Path of the JSON history record.
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Storage-safe copy of a snapshot: the image payload moves to the blob
    /// store and the snapshot keeps only the reference id.
    ///
    /// Snapshots already carrying an `image_id` pass through unchanged, so
    /// re-saving a loaded history never duplicates payloads. Ids are derived
    /// from the payload content hash, so the same image shared by several
    /// entries is stored once. On store failure the snapshot is returned
    /// unchanged and the failure is logged.
    pub fn externalize(&self, snapshot: &DocumentSnapshot) -> DocumentSnapshot {
        let Some(asset) = &snapshot.image else {
            return snapshot.clone();
        };
        if asset.image_id.is_some() {
            return snapshot.clone();
        }

        let handle = match (&asset.handle, &asset.data) {
            (Some(handle), _) => handle.clone(),
            (None, Some(data)) => {
                use base64::Engine as _;
                match base64::engine::general_purpose::STANDARD.decode(data) {
                    Ok(bytes) => ImageHandle::new(bytes),
                    Err(e) => {
                        warn!(error = %e, "Inlined image data is not valid base64; keeping as-is");
                        return snapshot.clone();
                    }
                }
            }
            // Nothing to externalize and nothing to reference.
            (None, None) => return snapshot.clone(),
        };

        let id = format!("img_{:016x}", payload_fingerprint(handle.bytes()));
        match self.blobs.set(handle.bytes(), Some(&id)) {
            Ok(stored_id) => {
                debug!(blob_id = %stored_id, bytes = handle.len(), "Externalized image payload");
                snapshot.with_image(Some(ImageAsset::from_reference(
                    stored_id,
                    asset.width,
                    asset.height,
                )))
            }
            Err(e) => {
                warn!(error = %e, "Failed to externalize image payload; keeping it in memory");
                snapshot.clone()
            }
        }
    }

    /// Reattach the image payload to a loaded snapshot.
    ///
    /// The reference id is kept alongside the handle so a later save reuses
    /// the stored blob. A reference whose payload is gone degrades to no
    /// image at all; the rest of the snapshot is preserved.
    pub fn rehydrate(&self, snapshot: &DocumentSnapshot) -> DocumentSnapshot {
        let Some(asset) = &snapshot.image else {
            return snapshot.clone();
        };
        if asset.handle.is_some() {
            return snapshot.clone();
        }
        let Some(id) = &asset.image_id else {
            // An asset with neither payload nor reference is unusable.
            warn!("Image asset has no payload and no reference id; dropping it");
            return snapshot.with_image(None);
        };

        match self.blobs.get(id) {
            Ok(Some(bytes)) => {
                let hydrated = ImageAsset {
                    handle: Some(ImageHandle::new(bytes)),
                    image_id: Some(id.clone()),
                    data: None,
                    width: asset.width,
                    height: asset.height,
                };
                snapshot.with_image(Some(hydrated))
            }
            Ok(None) => {
                warn!(blob_id = %id, "Stored image payload is missing; continuing without image");
                snapshot.with_image(None)
            }
            Err(e) => {
                warn!(blob_id = %id, error = %e, "Failed to read image payload; continuing without image");
                snapshot.with_image(None)
            }
        }
    }

    /// Persist a history state. Returns whether the write fully succeeded;
    /// `false` never carries an error to the caller, the reason is logged.
    pub fn save(&self, history: &HistoryState) -> bool {
        match self.try_save(history) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save history; edits stay in memory");
                false
            }
        }
    }

    fn try_save(&self, history: &HistoryState) -> StorageResult<()> {
        let record = self.externalize_history(history);
        let json = serde_json::to_string(&record)?;

        // Atomic write: temp file in the same directory, then rename.
        let temp_path = self.record_path.with_extension("json.tmp");
        std::fs::write(&temp_path, json.as_bytes())?;
        std::fs::rename(&temp_path, &self.record_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StorageError::Io(e)
        })?;

        debug!(
            path = %self.record_path.display(),
            past_depth = record.past.len(),
            future_depth = record.future.len(),
            "History record saved"
        );
        Ok(())
    }

    /// Storage-safe copy of a whole history state.
    ///
    /// Re-trims both stacks to `limit` before writing in case the caller
    /// handed over an oversized record built elsewhere.
    fn externalize_history(&self, history: &HistoryState) -> HistoryState {
        let externalize_entry = |entry: &HistoryEntry| HistoryEntry {
            snapshot: self.externalize(&entry.snapshot),
            action: entry.action.clone(),
        };
        HistoryState {
            past: history
                .past
                .iter()
                .take(history.limit)
                .map(externalize_entry)
                .collect(),
            present: self.externalize(&history.present),
            future: history
                .future
                .iter()
                .take(history.limit)
                .map(externalize_entry)
                .collect(),
            limit: history.limit,
            mode: history.mode,
        }
    }

    /// Load the saved history, rehydrating the present snapshot.
    ///
    /// Returns `None` when there is no record, the file is unreadable, the
    /// JSON is malformed, or the record fails shape validation. All failure
    /// paths log and leave the caller's in-memory state untouched.
    pub fn load(&self) -> Option<HistoryState> {
        let record = self.load_record()?;
        let present = self.rehydrate(&record.present);
        info!(
            past_depth = record.past.len(),
            future_depth = record.future.len(),
            "History record loaded"
        );
        Some(HistoryState { present, ..record })
    }

    fn load_record(&self) -> Option<HistoryState> {
        let json = match std::fs::read_to_string(&self.record_path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.record_path.display(), error = %e, "Failed to read history record");
                return None;
            }
        };
        let value: Value = match serde_json::from_str(&json) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "History record is not valid JSON; ignoring it");
                return None;
            }
        };
        if let Err(reason) = validate_record(&value) {
            warn!(reason = %reason, "History record failed validation; ignoring it");
            return None;
        }
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "History record failed to decode; ignoring it");
                None
            }
        }
    }

    /// Whether a valid saved record exists.
    pub fn has_history(&self) -> bool {
        self.load_record().is_some()
    }

    /// Number of states in the saved record (present + past + future),
    /// or 0 when nothing valid is stored.
    pub fn stored_state_count(&self) -> usize {
        self.load_record()
            .map(|r| 1 + r.past.len() + r.future.len())
            .unwrap_or(0)
    }

    /// Delete the saved record and every stored payload. Returns whether
    /// everything was removed.
    pub fn clear(&self) -> bool {
        let record_gone = match std::fs::remove_file(&self.record_path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(path = %self.record_path.display(), error = %e, "Failed to delete history record");
                false
            }
        };
        let blobs_gone = match self.blobs.clear() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to clear blob store");
                false
            }
        };
        record_gone && blobs_gone
    }
}

/// FNV-1a over the payload bytes.
///
/// Blob ids derived from this land on disk, so the function must produce
/// the same value forever; the std hashers make no such guarantee across
/// releases.
fn payload_fingerprint(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Structural validation of a decoded history record.
///
/// Checked before the typed decode so a record with the wrong shape is
/// rejected with a precise reason instead of a generic serde error.
fn validate_record(value: &Value) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "record is not a JSON object".to_string())?;
    match obj.get("present") {
        Some(present) if present.is_object() => {}
        Some(_) => return Err("present is not an object".into()),
        None => return Err("present is missing".into()),
    }
    match obj.get("past") {
        Some(past) if past.is_array() => {}
        _ => return Err("past is not an array".into()),
    }
    match obj.get("future") {
        Some(future) if future.is_array() => {}
        _ => return Err("future is not an array".into()),
    }
    match obj.get("limit") {
        Some(limit) if limit.is_number() => {}
        _ => return Err("limit is not a number".into()),
    }
    Ok(())
}
