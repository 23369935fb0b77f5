//! `caplab-editor-state` — Document model and versioned history for the
//! CaptionLab editor.
//!
//! This crate provides:
//!
//! - **`DocumentSnapshot`**: Immutable value describing one editable state
//!   (canvas metadata, optional background image, ordered text layers).
//! - **`HistoryState`**: Bounded past/present/future stack with pure
//!   commit/undo/redo transitions.
//! - **Selective resolution**: Undo/redo navigation that treats the layer
//!   list and the background image as independent axes, preferring the axis
//!   that changed most recently.
//! - **`ActionDescriptor`**: Human-readable tags attached to every history
//!   entry for display ("Last: Move Layer").
//!
//! # Architecture
//!
//! ```text
//! HistoryState
//! ├── past: Vec<HistoryEntry>     (most-recent-first, truncated to limit)
//! ├── present: DocumentSnapshot   (the live state)
//! ├── future: Vec<HistoryEntry>   (nearest-first, cleared on commit)
//! └── mode: ResolveMode           (selective or strict chronological)
//!
//! DocumentSnapshot
//! ├── canvas: CanvasMeta
//! ├── image: Option<ImageAsset>   (in-memory handle and/or blob reference)
//! ├── layers: Vec<TextLayer>
//! └── content stamps              (computed once, drive axis comparison)
//! ```
//!
//! Every transition produces a brand-new `HistoryState`; nothing is mutated
//! in place, so callers can hold references to superseded states safely.

pub mod actions;
pub mod history;
mod resolver;
pub mod snapshot;

// Re-export primary types at crate root for convenience.
pub use actions::{ActionDescriptor, ActionKind};
pub use history::{HistoryEntry, HistoryState, HistoryStats, DEFAULT_HISTORY_LIMIT};
pub use resolver::ResolveMode;
pub use snapshot::{
    Alignment, CanvasMeta, DocumentSnapshot, ImageAsset, ImageHandle, Rgba, TextLayer,
};
