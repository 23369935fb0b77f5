//! Editing session facade.
//!
//! `EditorSession` owns the live history, the optional persistence gateway,
//! and the save debouncer, and wires the degradation rules together: a
//! session whose storage failed to open behaves identically to a persisted
//! one except that nothing ever hits disk.

use std::path::Path;

use tracing::{debug, info, warn};

use caplab_editor_state::{
    ActionDescriptor, ActionKind, DocumentSnapshot, HistoryState, HistoryStats, ResolveMode,
};

use crate::autosave::SaveDebouncer;
use crate::export::{self, ExportData};
use crate::gateway::PersistenceGateway;

/// One document's editing session.
pub struct EditorSession {
    history: HistoryState,
    gateway: Option<PersistenceGateway>,
    debouncer: SaveDebouncer,
}

impl EditorSession {
    /// Session persisted under `dir`.
    ///
    /// If the storage directory cannot be opened the session degrades to
    /// memory-only instead of failing; editing works either way.
    pub fn open(dir: impl AsRef<Path>, limit: usize) -> Self {
        let gateway = match PersistenceGateway::open(dir.as_ref()) {
            Ok(gateway) => Some(gateway),
            Err(e) => {
                warn!(
                    path = %dir.as_ref().display(),
                    error = %e,
                    "Storage unavailable; editing in memory only"
                );
                None
            }
        };
        Self {
            history: HistoryState::new(DocumentSnapshot::empty(), limit),
            gateway,
            debouncer: SaveDebouncer::default(),
        }
    }

    /// Session with no persistence at all.
    pub fn in_memory(limit: usize) -> Self {
        Self {
            history: HistoryState::new(DocumentSnapshot::empty(), limit),
            gateway: None,
            debouncer: SaveDebouncer::default(),
        }
    }

    /// Session over an explicit gateway (custom blob backends, tests).
    pub fn with_gateway(gateway: PersistenceGateway, limit: usize) -> Self {
        Self {
            history: HistoryState::new(DocumentSnapshot::empty(), limit),
            gateway: Some(gateway),
            debouncer: SaveDebouncer::default(),
        }
    }

    /// Same session with a custom debounce quiet period.
    pub fn with_debounce_ms(mut self, delay_ms: u64) -> Self {
        self.debouncer = SaveDebouncer::new(delay_ms);
        self
    }

    /// Whether this session can persist anything.
    pub fn is_persistent(&self) -> bool {
        self.gateway.is_some()
    }

    /// Replace the in-memory history with the saved record, if any.
    ///
    /// The swap is all-or-nothing: on any load failure the current state is
    /// left untouched and `false` is returned.
    pub fn restore_saved(&mut self) -> bool {
        let Some(gateway) = &self.gateway else {
            return false;
        };
        match gateway.load() {
            Some(history) => {
                info!(
                    past_depth = history.past.len(),
                    future_depth = history.future.len(),
                    "Restored saved history"
                );
                self.history = history;
                self.debouncer.mark_saved();
                true
            }
            None => false,
        }
    }

    /// Record a new present state and schedule a save.
    pub fn commit(&mut self, snapshot: DocumentSnapshot, action: ActionDescriptor) -> &HistoryState {
        self.history = self.history.commit(snapshot, action);
        self.debouncer.mark_dirty();
        &self.history
    }

    /// Step backwards. The new present is rehydrated if it landed on a
    /// reference-only snapshot. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&HistoryState> {
        let mut next = self.history.undo()?;
        if let Some(gateway) = &self.gateway {
            next.present = gateway.rehydrate(&next.present);
        }
        self.history = next;
        self.debouncer.mark_dirty();
        debug!(past_depth = self.history.past.len(), "Undo applied");
        Some(&self.history)
    }

    /// Step forwards, mirroring [`EditorSession::undo`].
    pub fn redo(&mut self) -> Option<&HistoryState> {
        let mut next = self.history.redo()?;
        if let Some(gateway) = &self.gateway {
            next.present = gateway.rehydrate(&next.present);
        }
        self.history = next;
        self.debouncer.mark_dirty();
        debug!(future_depth = self.history.future.len(), "Redo applied");
        Some(&self.history)
    }

    /// Reset the document by committing a fresh empty snapshot. The reset
    /// itself is undoable like any other edit.
    pub fn clear_document(&mut self) -> &HistoryState {
        self.commit(
            DocumentSnapshot::empty(),
            ActionDescriptor::tagged(ActionKind::ClearCanvas),
        )
    }

    /// Switch how undo/redo pick their target entry.
    pub fn set_resolve_mode(&mut self, mode: ResolveMode) {
        if self.history.mode != mode {
            self.history.mode = mode;
            self.debouncer.mark_dirty();
        }
    }

    /// The live history state.
    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    /// The live present snapshot.
    pub fn present(&self) -> &DocumentSnapshot {
        &self.history.present
    }

    /// Stack counters and head actions.
    pub fn stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// The save debouncer, for inspection and enable/disable.
    pub fn debouncer(&self) -> &SaveDebouncer {
        &self.debouncer
    }

    /// Enable or disable debounced saving.
    pub fn set_autosave_enabled(&mut self, enabled: bool) {
        self.debouncer.set_enabled(enabled);
    }

    /// Save now if the debounce quiet period has elapsed. Returns whether a
    /// save actually ran and succeeded.
    pub fn maybe_save(&mut self) -> bool {
        if !self.debouncer.should_save() {
            return false;
        }
        self.save_now()
    }

    /// Save immediately regardless of the quiet period, e.g. on shutdown.
    /// Returns whether anything was (successfully) written.
    pub fn flush(&mut self) -> bool {
        if !self.debouncer.is_dirty() {
            return false;
        }
        self.save_now()
    }

    fn save_now(&mut self) -> bool {
        let Some(gateway) = &self.gateway else {
            // Nothing to write to; drop the pending flag so polling settles.
            self.debouncer.mark_saved();
            return false;
        };
        let saved = gateway.save(&self.history);
        if saved {
            self.debouncer.mark_saved();
        }
        saved
    }

    /// Delete everything this session has persisted. The in-memory state is
    /// unaffected. Returns whether storage is now empty.
    pub fn clear_saved(&mut self) -> bool {
        match &self.gateway {
            Some(gateway) => gateway.clear(),
            None => true,
        }
    }

    /// Build a portable export of the full history.
    pub fn export(&self) -> ExportData {
        export::export_history(&self.history, self.gateway.as_ref().map(|g| g.blobs()))
    }

    /// Export as pretty-printed JSON. `None` if serialization fails.
    pub fn export_json(&self) -> Option<String> {
        match export::to_json_string(&self.export()) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "Failed to serialize export");
                None
            }
        }
    }

    /// Replace the session history with an imported envelope.
    pub fn import(&mut self, data: &ExportData) {
        self.history = export::import_history(data);
        self.debouncer.mark_dirty();
        info!(
            total_states = data.metadata.total_states,
            "Imported history export"
        );
    }
}
