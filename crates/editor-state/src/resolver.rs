//! Target selection for undo/redo.
//!
//! Plain linear navigation (pop the nearest entry, push the present to the
//! other side) is available as [`ResolveMode::Chronological`]. The default
//! [`ResolveMode::Selective`] treats the layer list and the background image
//! as two independent axes:
//!
//! - **Undo** jumps to the nearest past entry whose *layers* differ, even
//!   when image-only changes sit in between, and replaces only the layer
//!   list — canvas and image stay exactly as they are. Only when no past
//!   entry differs in layers does it fall back to the nearest image change
//!   (or entry 0), restoring that whole snapshot. Repeated undo therefore
//!   steps through per-layer edits one at a time while treating the
//!   background image as an axis the user rarely wants to fall through
//!   accidentally.
//! - **Redo** restores the nearest checkpoint in the future stack — the
//!   complete outgoing present that an undo pushed there — so each redo
//!   exactly inverts the undo that produced it, including the background
//!   image. Once no checkpoints remain, leftover relocated entries are
//!   resolved by nearest changed axis, layers winning ties.
//!
//! Entries skipped over are never discarded: they relocate to the opposite
//! stack behind the outgoing present (which is tagged with a synthetic
//! undo/redo action), so navigation can still reach them later.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::{ActionDescriptor, ActionKind};
use crate::history::{HistoryEntry, HistoryState};
use crate::snapshot::DocumentSnapshot;

/// How undo/redo pick their target entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Axis-aware navigation (the default).
    #[default]
    Selective,
    /// Strict one-entry-at-a-time navigation, full snapshot replacement.
    Chronological,
}

/// Which part of the target snapshot replaces the present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    /// Replace only the layer list; canvas and image are preserved.
    Layers,
    /// Replace the entire snapshot.
    Full,
}

pub(crate) fn selective_undo(state: &HistoryState) -> Option<HistoryState> {
    let present = &state.present;

    // Layer changes take priority even when image changes sit nearer.
    let (idx, scope) = match state
        .past
        .iter()
        .position(|e| e.snapshot.layers_stamp != present.layers_stamp)
    {
        Some(i) => (i, Scope::Layers),
        None => {
            let i = state
                .past
                .iter()
                .position(|e| e.snapshot.image_stamp != present.image_stamp)
                .unwrap_or(0);
            (i, Scope::Full)
        }
    };

    let target = state.past.get(idx)?;
    let new_present = apply_target(present, &target.snapshot, scope);

    let mut future = Vec::with_capacity(idx + 1 + state.future.len());
    future.push(HistoryEntry {
        snapshot: present.clone(),
        action: ActionDescriptor::tagged(ActionKind::Redo),
    });
    future.extend(state.past[..idx].iter().rev().cloned());
    future.extend(state.future.iter().cloned());

    debug!(
        target = idx,
        skipped = idx,
        layers_only = scope == Scope::Layers,
        "Undo resolved"
    );

    Some(HistoryState {
        past: state.past[idx + 1..].to_vec(),
        present: new_present,
        future,
        limit: state.limit,
        mode: state.mode,
    })
}

pub(crate) fn selective_redo(state: &HistoryState) -> Option<HistoryState> {
    let present = &state.present;

    // Checkpoint entries (the outgoing present an undo pushed, tagged with
    // the synthetic redo action) hold the complete pre-undo snapshot, so
    // restoring one in full is the exact inverse of that undo regardless of
    // the scope the undo used. They take priority over relocated plain
    // entries, which may differ on the image axis at a nearer index and
    // would otherwise hijack the redo and drop the restored image.
    let (idx, scope) = match state
        .future
        .iter()
        .position(|e| e.action.kind == ActionKind::Redo)
    {
        Some(i) => (i, Scope::Full),
        None => {
            // Only relocated plain entries remain; the nearest changed
            // axis wins, layers on a tie.
            let layer_idx = state
                .future
                .iter()
                .position(|e| e.snapshot.layers_stamp != present.layers_stamp);
            let image_idx = state
                .future
                .iter()
                .position(|e| e.snapshot.image_stamp != present.image_stamp);
            match (layer_idx, image_idx) {
                (Some(l), Some(i)) if i < l => (i, Scope::Full),
                (Some(l), _) => (l, Scope::Layers),
                (None, Some(i)) => (i, Scope::Full),
                (None, None) => (0, Scope::Full),
            }
        }
    };

    let target = state.future.get(idx)?;
    let new_present = apply_target(present, &target.snapshot, scope);

    let mut past = Vec::with_capacity(idx + 1 + state.past.len());
    past.push(HistoryEntry {
        snapshot: present.clone(),
        action: ActionDescriptor::tagged(ActionKind::Undo),
    });
    past.extend(state.future[..idx].iter().rev().cloned());
    past.extend(state.past.iter().cloned());

    debug!(
        target = idx,
        skipped = idx,
        layers_only = scope == Scope::Layers,
        "Redo resolved"
    );

    Some(HistoryState {
        past,
        present: new_present,
        future: state.future[idx + 1..].to_vec(),
        limit: state.limit,
        mode: state.mode,
    })
}

pub(crate) fn chronological_undo(state: &HistoryState) -> Option<HistoryState> {
    let target = state.past.first()?;

    let mut future = Vec::with_capacity(1 + state.future.len());
    future.push(HistoryEntry {
        snapshot: state.present.clone(),
        action: ActionDescriptor::tagged(ActionKind::Redo),
    });
    future.extend(state.future.iter().cloned());

    Some(HistoryState {
        past: state.past[1..].to_vec(),
        present: target.snapshot.clone(),
        future,
        limit: state.limit,
        mode: state.mode,
    })
}

pub(crate) fn chronological_redo(state: &HistoryState) -> Option<HistoryState> {
    let target = state.future.first()?;

    let mut past = Vec::with_capacity(1 + state.past.len());
    past.push(HistoryEntry {
        snapshot: state.present.clone(),
        action: ActionDescriptor::tagged(ActionKind::Undo),
    });
    past.extend(state.past.iter().cloned());

    Some(HistoryState {
        past,
        present: target.snapshot.clone(),
        future: state.future[1..].to_vec(),
        limit: state.limit,
        mode: state.mode,
    })
}

fn apply_target(
    present: &DocumentSnapshot,
    target: &DocumentSnapshot,
    scope: Scope,
) -> DocumentSnapshot {
    match scope {
        Scope::Layers => present.with_layers(target.layers.clone()),
        Scope::Full => target.clone(),
    }
}
