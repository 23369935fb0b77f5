//! Bounded past/present/future history stack.
//!
//! The stack is a pure value: `commit`, `undo`, and `redo` build a brand-new
//! `HistoryState` and leave the receiver untouched, so the caller swaps the
//! whole structure on every transition. There is no locking because there is
//! no shared mutable state at this layer.
//!
//! `past` is ordered most-recent-first and truncated to `limit` on commit;
//! once an entry falls off the end that point in history is permanently
//! unreachable. `future` is ordered nearest-first and cleared entirely by
//! every commit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionDescriptor;
use crate::resolver::{self, ResolveMode};
use crate::snapshot::DocumentSnapshot;

/// Default maximum number of past entries retained.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// A snapshot paired with the action that superseded it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The document state at this point in history.
    pub snapshot: DocumentSnapshot,
    /// Descriptor of the action that moved history past this state.
    pub action: ActionDescriptor,
}

/// The full undo/redo stack for one editing session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    /// Undone-to states, most recent first.
    pub past: Vec<HistoryEntry>,
    /// The live document state.
    pub present: DocumentSnapshot,
    /// Redoable states, nearest first.
    pub future: Vec<HistoryEntry>,
    /// Maximum number of past entries retained.
    pub limit: usize,
    /// How undo/redo pick their target entry.
    #[serde(default)]
    pub mode: ResolveMode,
}

/// Read-only projections over a history state.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryStats {
    pub past_count: usize,
    pub future_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Action that would be undone next.
    pub last_action: Option<ActionDescriptor>,
    /// Action that would be redone next.
    pub next_action: Option<ActionDescriptor>,
}

impl HistoryState {
    /// Fresh history around an initial snapshot.
    pub fn new(initial: DocumentSnapshot, limit: usize) -> Self {
        Self {
            past: Vec::new(),
            present: initial,
            future: Vec::new(),
            limit,
            mode: ResolveMode::default(),
        }
    }

    /// Fresh history with the default limit and an empty document.
    pub fn empty() -> Self {
        Self::new(DocumentSnapshot::empty(), DEFAULT_HISTORY_LIMIT)
    }

    /// Same history navigated with a different resolve mode.
    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Record a new present state.
    ///
    /// The outgoing present moves to the front of `past` tagged with the
    /// incoming action, `past` is truncated to `limit` (the oldest entries
    /// drop silently), and `future` is cleared.
    pub fn commit(&self, snapshot: DocumentSnapshot, action: ActionDescriptor) -> HistoryState {
        let mut past = Vec::with_capacity((self.past.len() + 1).min(self.limit.max(1)));
        past.push(HistoryEntry {
            snapshot: self.present.clone(),
            action,
        });
        past.extend(self.past.iter().cloned());
        past.truncate(self.limit);

        debug!(
            past_depth = past.len(),
            limit = self.limit,
            "History entry committed"
        );

        HistoryState {
            past,
            present: snapshot,
            future: Vec::new(),
            limit: self.limit,
            mode: self.mode,
        }
    }

    /// Step backwards. `None` when `past` is empty; callers should disable
    /// the control rather than retry.
    pub fn undo(&self) -> Option<HistoryState> {
        if self.past.is_empty() {
            return None;
        }
        match self.mode {
            ResolveMode::Selective => resolver::selective_undo(self),
            ResolveMode::Chronological => resolver::chronological_undo(self),
        }
    }

    /// Step forwards. `None` when `future` is empty.
    pub fn redo(&self) -> Option<HistoryState> {
        if self.future.is_empty() {
            return None;
        }
        match self.mode {
            ResolveMode::Selective => resolver::selective_redo(self),
            ResolveMode::Chronological => resolver::chronological_redo(self),
        }
    }

    /// Whether undo is available.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Whether redo is available.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Action that would be undone next.
    pub fn last_action(&self) -> Option<&ActionDescriptor> {
        self.past.first().map(|e| &e.action)
    }

    /// Action that would be redone next.
    pub fn next_action(&self) -> Option<&ActionDescriptor> {
        self.future.first().map(|e| &e.action)
    }

    /// Pure projection of the stack counters and head actions.
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            past_count: self.past.len(),
            future_count: self.future.len(),
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            last_action: self.last_action().cloned(),
            next_action: self.next_action().cloned(),
        }
    }
}

impl Default for HistoryState {
    fn default() -> Self {
        Self::empty()
    }
}
