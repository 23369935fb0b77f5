//! Persistence, export, and session plumbing for caption documents.
//!
//! The history model in `caplab-editor-state` is pure and storage-agnostic;
//! this crate puts it on disk and gets it back:
//!
//! ```text
//!  EditorSession ──── commit/undo/redo ────► HistoryState (in memory)
//!        │                                        │
//!        │ debounced                              │ externalize /
//!        ▼                                        ▼ rehydrate
//!  SaveDebouncer ──► PersistenceGateway ──► history.json + BlobStore
//!                                                 │
//!                                                 ▼
//!                                           ExportData (base64 inlined)
//! ```
//!
//! The record file stays JSON-safe because image payloads are swapped for
//! blob-store ids on the way out and reattached on the way back in. Every
//! storage failure degrades (logged, `bool`/`Option` surfaces) rather than
//! propagating into the editing path.

pub mod autosave;
pub mod blob;
pub mod error;
pub mod export;
pub mod gateway;
pub mod session;

pub use autosave::{SaveDebouncer, DEFAULT_DEBOUNCE_MS};
pub use blob::{generate_blob_id, BlobStore, FileBlobStore, MemoryBlobStore, StoredBlob};
pub use error::{StorageError, StorageResult};
pub use export::{
    export_history, from_json_string, import_history, to_json_string, ExportData, ExportMetadata,
    EXPORT_VERSION,
};
pub use gateway::PersistenceGateway;
pub use session::EditorSession;
