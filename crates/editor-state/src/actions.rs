//! History action descriptors.
//!
//! Every history entry pairs a snapshot with a descriptor saying which user
//! action produced it. Descriptors are display metadata ("Last: Move
//! Layer") and input for future coalescing; the resolver never branches on
//! them.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Tag identifying the kind of edit an entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddTextLayer,
    UpdateTextContent,
    UpdateFontFamily,
    UpdateFontSize,
    UpdateFontWeight,
    UpdateTextAlignment,
    UpdateTextColor,
    UpdateTextOpacity,
    MoveLayer,
    ResizeLayer,
    RotateLayer,
    DeleteLayer,
    ReorderLayers,
    DuplicateLayer,
    SetImage,
    ClearCanvas,
    /// Synthetic tag for a present entry relocated to `past` by redo.
    Undo,
    /// Synthetic tag for a present entry relocated to `future` by undo.
    Redo,
}

impl ActionKind {
    /// Default human-readable label for this kind.
    pub fn label(self) -> &'static str {
        match self {
            ActionKind::AddTextLayer => "Add Text Layer",
            ActionKind::UpdateTextContent => "Update Text",
            ActionKind::UpdateFontFamily => "Change Font",
            ActionKind::UpdateFontSize => "Set Font Size",
            ActionKind::UpdateFontWeight => "Set Font Weight",
            ActionKind::UpdateTextAlignment => "Align Text",
            ActionKind::UpdateTextColor => "Change Text Color",
            ActionKind::UpdateTextOpacity => "Set Opacity",
            ActionKind::MoveLayer => "Move Layer",
            ActionKind::ResizeLayer => "Resize Layer",
            ActionKind::RotateLayer => "Rotate Layer",
            ActionKind::DeleteLayer => "Delete Layer",
            ActionKind::ReorderLayers => "Reorder Layers",
            ActionKind::DuplicateLayer => "Duplicate Layer",
            ActionKind::SetImage => "Set Background Image",
            ActionKind::ClearCanvas => "Clear Canvas",
            ActionKind::Undo => "Undo",
            ActionKind::Redo => "Redo",
        }
    }
}

/// Descriptor attached to every history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    /// Kind tag.
    pub kind: ActionKind,
    /// Human-readable label, e.g. `Set Font Size: 24px`.
    pub label: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl ActionDescriptor {
    /// Descriptor with a custom label.
    pub fn new(kind: ActionKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            timestamp: epoch_millis(),
        }
    }

    /// Descriptor with the kind's default label.
    pub fn tagged(kind: ActionKind) -> Self {
        Self::new(kind, kind.label())
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_uses_default_label() {
        let action = ActionDescriptor::tagged(ActionKind::MoveLayer);
        assert_eq!(action.kind, ActionKind::MoveLayer);
        assert_eq!(action.label, "Move Layer");
        assert!(action.timestamp > 0);
    }

    #[test]
    fn custom_label_survives() {
        let action = ActionDescriptor::new(ActionKind::UpdateFontSize, "Set Font Size: 24px");
        assert_eq!(action.label, "Set Font Size: 24px");
    }

    #[test]
    fn kind_serializes_as_snake_case_tag() {
        let json = serde_json::to_string(&ActionKind::AddTextLayer).expect("serialize");
        assert_eq!(json, "\"add_text_layer\"");
        let json = serde_json::to_string(&ActionKind::SetImage).expect("serialize");
        assert_eq!(json, "\"set_image\"");
    }

    #[test]
    fn descriptor_roundtrip() {
        let action = ActionDescriptor::tagged(ActionKind::DeleteLayer);
        let json = serde_json::to_string(&action).expect("serialize");
        let back: ActionDescriptor = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, action);
    }
}
