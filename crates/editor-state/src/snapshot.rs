//! Immutable document snapshot model.
//!
//! A `DocumentSnapshot` fully describes one editable state: canvas metadata,
//! an optional background image, and the ordered text layer list. Snapshots
//! are never mutated in place — every edit builds a new snapshot, and the
//! history stack only ever swaps whole values.
//!
//! Each snapshot carries two **content stamps**, one per navigation axis
//! (layers, image), computed once at construction. The resolver compares
//! stamps instead of walking the trees, which also makes the comparison
//! immune to key-ordering differences in the serialized form.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Canvas display metadata.
///
/// `rotation` is part of the contract but stays 0 in practice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasMeta {
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Zoom scale (1.0 = 100%).
    pub scale: f64,
    /// Canvas rotation in degrees.
    pub rotation: f64,
}

impl Default for CanvasMeta {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

/// RGBA color with byte channels and fractional alpha.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha, 0.0 to 1.0.
    pub a: f32,
}

impl Rgba {
    /// Opaque black, the default text color.
    pub const BLACK: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 1.0,
    };
}

/// Horizontal text alignment within a layer box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// A positioned text layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// Unique layer id.
    pub id: String,
    /// Text content.
    pub text: String,
    /// X position in canvas pixels.
    pub x: f64,
    /// Y position in canvas pixels.
    pub y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Box width in pixels.
    pub width: f64,
    /// Box height in pixels.
    pub height: f64,
    /// Font family name.
    pub font_family: String,
    /// Font weight (400 = regular, 700 = bold).
    pub font_weight: u16,
    /// Font size in pixels.
    pub font_size: f64,
    /// Text color.
    pub color: Rgba,
    /// Layer opacity, 0.0 to 1.0.
    pub opacity: f64,
    /// Horizontal alignment.
    pub alignment: Alignment,
    /// Whether the layer is locked against edits.
    pub locked: bool,
    /// Stacking order. Intended unique, not enforced here.
    pub z_index: i32,
    /// Whether the layer is currently selected.
    pub selected: bool,
}

/// In-memory image payload handle.
///
/// Cheap to clone (the payload is shared behind an `Arc`); the underlying
/// bytes are released when the last clone is dropped. The content hash is
/// computed once at creation and identifies the payload for the lifetime
/// of the session.
#[derive(Clone)]
pub struct ImageHandle {
    bytes: Arc<Vec<u8>>,
    content_hash: u64,
}

impl ImageHandle {
    /// Wrap decoded image bytes in a shareable handle.
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self {
            bytes: Arc::new(bytes),
            content_hash: hasher.finish(),
        }
    }

    /// The raw image payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hash of the payload content, stable for the session.
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
            || (self.content_hash == other.content_hash && self.bytes.len() == other.bytes.len())
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("len", &self.bytes.len())
            .field("content_hash", &format_args!("{:016x}", self.content_hash))
            .finish()
    }
}

/// Background image reference.
///
/// Exactly one of the payload carriers is meaningful at a time:
///
/// - **Hydrated**: `handle` holds the in-memory payload (never serialized).
///   A previously persisted image also keeps its `image_id` so re-saving
///   can reuse the stored blob.
/// - **Persisted**: only `image_id` survives serialization; the handle is
///   reattached by rehydration.
/// - **Exported**: `data` carries the base64-inlined payload so the
///   document is self-contained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    /// Locally usable payload. Ephemeral, never persisted.
    #[serde(skip)]
    pub handle: Option<ImageHandle>,
    /// Blob-store reference id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Base64-inlined payload, present only in the portable export form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Original pixel width.
    pub width: u32,
    /// Original pixel height.
    pub height: u32,
}

impl ImageAsset {
    /// A freshly decoded image that has not been persisted yet.
    pub fn from_handle(handle: ImageHandle, width: u32, height: u32) -> Self {
        Self {
            handle: Some(handle),
            image_id: None,
            data: None,
            width,
            height,
        }
    }

    /// A persisted reference with no local payload.
    pub fn from_reference(image_id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            handle: None,
            image_id: Some(image_id.into()),
            data: None,
            width,
            height,
        }
    }
}

/// One complete editable state.
///
/// Construct through [`DocumentSnapshot::new`] (or the `with_*` builders)
/// so the content stamps stay consistent with the fields. Deserialization
/// recomputes the stamps; they are never written out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SnapshotParts")]
pub struct DocumentSnapshot {
    /// Canvas display metadata.
    pub canvas: CanvasMeta,
    /// Optional background image.
    pub image: Option<ImageAsset>,
    /// Ordered text layers.
    pub layers: Vec<TextLayer>,
    /// Content stamp of the layer list. Derived, not serialized.
    #[serde(skip_serializing)]
    pub layers_stamp: u64,
    /// Content stamp of the background image. Derived, not serialized.
    #[serde(skip_serializing)]
    pub image_stamp: u64,
}

impl DocumentSnapshot {
    /// Build a snapshot and compute its content stamps.
    pub fn new(canvas: CanvasMeta, image: Option<ImageAsset>, layers: Vec<TextLayer>) -> Self {
        let layers_stamp = layers_stamp(&layers);
        let image_stamp = image_stamp(image.as_ref());
        Self {
            canvas,
            image,
            layers,
            layers_stamp,
            image_stamp,
        }
    }

    /// The empty document every session starts from.
    pub fn empty() -> Self {
        Self::new(CanvasMeta::default(), None, Vec::new())
    }

    /// New snapshot with a replaced layer list.
    pub fn with_layers(&self, layers: Vec<TextLayer>) -> Self {
        Self::new(self.canvas, self.image.clone(), layers)
    }

    /// New snapshot with a replaced background image.
    pub fn with_image(&self, image: Option<ImageAsset>) -> Self {
        Self::new(self.canvas, image, self.layers.clone())
    }

    /// New snapshot with replaced canvas metadata.
    pub fn with_canvas(&self, canvas: CanvasMeta) -> Self {
        Self::new(canvas, self.image.clone(), self.layers.clone())
    }
}

impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Serialized shape of a snapshot; converting recomputes the stamps.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotParts {
    #[serde(default)]
    canvas: CanvasMeta,
    #[serde(default)]
    image: Option<ImageAsset>,
    #[serde(default)]
    layers: Vec<TextLayer>,
}

impl From<SnapshotParts> for DocumentSnapshot {
    fn from(parts: SnapshotParts) -> Self {
        DocumentSnapshot::new(parts.canvas, parts.image, parts.layers)
    }
}

fn hash_f64(value: f64, hasher: &mut impl Hasher) {
    hasher.write_u64(value.to_bits());
}

fn hash_layer(layer: &TextLayer, hasher: &mut impl Hasher) {
    layer.id.hash(hasher);
    layer.text.hash(hasher);
    hash_f64(layer.x, hasher);
    hash_f64(layer.y, hasher);
    hash_f64(layer.rotation, hasher);
    hash_f64(layer.width, hasher);
    hash_f64(layer.height, hasher);
    layer.font_family.hash(hasher);
    layer.font_weight.hash(hasher);
    hash_f64(layer.font_size, hasher);
    hasher.write_u8(layer.color.r);
    hasher.write_u8(layer.color.g);
    hasher.write_u8(layer.color.b);
    hasher.write_u32(layer.color.a.to_bits());
    hash_f64(layer.opacity, hasher);
    (layer.alignment as u8).hash(hasher);
    layer.locked.hash(hasher);
    layer.z_index.hash(hasher);
    layer.selected.hash(hasher);
}

/// Content stamp over the full ordered layer list.
fn layers_stamp(layers: &[TextLayer]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write_usize(layers.len());
    for layer in layers {
        hash_layer(layer, &mut hasher);
    }
    hasher.finish()
}

/// Content stamp identifying the background image.
///
/// Prefers the stable blob reference id, then the in-memory payload hash,
/// then the inlined export data. `None` stamps to a fixed sentinel so that
/// "no image" compares equal across snapshots.
fn image_stamp(image: Option<&ImageAsset>) -> u64 {
    let mut hasher = DefaultHasher::new();
    match image {
        None => hasher.write_u8(0),
        Some(asset) => {
            hasher.write_u8(1);
            if let Some(id) = &asset.image_id {
                hasher.write_u8(1);
                id.hash(&mut hasher);
            } else if let Some(handle) = &asset.handle {
                hasher.write_u8(2);
                hasher.write_u64(handle.content_hash());
            } else if let Some(data) = &asset.data {
                hasher.write_u8(3);
                data.hash(&mut hasher);
            }
            hasher.write_u32(asset.width);
            hasher.write_u32(asset.height);
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_layer(id: &str, x: f64, y: f64) -> TextLayer {
        TextLayer {
            id: id.to_string(),
            text: "New Text".to_string(),
            x,
            y,
            rotation: 0.0,
            width: 100.0,
            height: 24.0,
            font_family: "Arial".to_string(),
            font_weight: 400,
            font_size: 18.0,
            color: Rgba::BLACK,
            opacity: 1.0,
            alignment: Alignment::Center,
            locked: false,
            z_index: 0,
            selected: false,
        }
    }

    #[test]
    fn empty_snapshot_defaults() {
        let snap = DocumentSnapshot::empty();
        assert_eq!(snap.canvas.width, 800);
        assert_eq!(snap.canvas.height, 600);
        assert!(snap.image.is_none());
        assert!(snap.layers.is_empty());
    }

    #[test]
    fn identical_layers_share_a_stamp() {
        let a = DocumentSnapshot::empty().with_layers(vec![make_layer("l1", 10.0, 20.0)]);
        let b = DocumentSnapshot::empty().with_layers(vec![make_layer("l1", 10.0, 20.0)]);
        assert_eq!(a.layers_stamp, b.layers_stamp);
    }

    #[test]
    fn moving_a_layer_changes_the_stamp() {
        let a = DocumentSnapshot::empty().with_layers(vec![make_layer("l1", 10.0, 20.0)]);
        let b = a.with_layers(vec![make_layer("l1", 11.0, 20.0)]);
        assert_ne!(a.layers_stamp, b.layers_stamp);
    }

    #[test]
    fn layer_change_leaves_image_stamp_alone() {
        let handle = ImageHandle::new(vec![1, 2, 3]);
        let base = DocumentSnapshot::empty()
            .with_image(Some(ImageAsset::from_handle(handle, 640, 480)));
        let edited = base.with_layers(vec![make_layer("l1", 0.0, 0.0)]);
        assert_eq!(base.image_stamp, edited.image_stamp);
        assert_ne!(base.layers_stamp, edited.layers_stamp);
    }

    #[test]
    fn no_image_stamps_equal() {
        let a = DocumentSnapshot::empty();
        let b = DocumentSnapshot::empty().with_layers(vec![make_layer("l1", 0.0, 0.0)]);
        assert_eq!(a.image_stamp, b.image_stamp);
    }

    #[test]
    fn different_payloads_stamp_differently() {
        let a = DocumentSnapshot::empty().with_image(Some(ImageAsset::from_handle(
            ImageHandle::new(vec![1, 2, 3]),
            640,
            480,
        )));
        let b = DocumentSnapshot::empty().with_image(Some(ImageAsset::from_handle(
            ImageHandle::new(vec![4, 5, 6]),
            640,
            480,
        )));
        assert_ne!(a.image_stamp, b.image_stamp);
    }

    #[test]
    fn reference_identity_drives_the_image_stamp() {
        let a = DocumentSnapshot::empty()
            .with_image(Some(ImageAsset::from_reference("img_a", 640, 480)));
        let same = DocumentSnapshot::empty()
            .with_image(Some(ImageAsset::from_reference("img_a", 640, 480)));
        let other = DocumentSnapshot::empty()
            .with_image(Some(ImageAsset::from_reference("img_b", 640, 480)));
        assert_eq!(a.image_stamp, same.image_stamp);
        assert_ne!(a.image_stamp, other.image_stamp);
    }

    #[test]
    fn handle_clone_shares_payload() {
        let handle = ImageHandle::new(vec![9; 1024]);
        let clone = handle.clone();
        assert_eq!(handle, clone);
        assert_eq!(clone.len(), 1024);
        assert_eq!(handle.content_hash(), clone.content_hash());
    }

    #[test]
    fn serialization_skips_the_handle() {
        let snap = DocumentSnapshot::empty().with_image(Some(ImageAsset::from_handle(
            ImageHandle::new(vec![1, 2, 3]),
            320,
            240,
        )));
        let json = serde_json::to_string(&snap).expect("serialize");
        assert!(!json.contains("handle"));
        assert!(!json.contains("layersStamp"));

        let back: DocumentSnapshot = serde_json::from_str(&json).expect("deserialize");
        let image = back.image.expect("image survives");
        assert!(image.handle.is_none());
        assert_eq!(image.width, 320);
        assert_eq!(image.height, 240);
    }

    #[test]
    fn deserialization_recomputes_stamps() {
        let snap = DocumentSnapshot::empty().with_layers(vec![make_layer("l1", 5.0, 5.0)]);
        let json = serde_json::to_string(&snap).expect("serialize");
        let back: DocumentSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.layers_stamp, snap.layers_stamp);
        assert_eq!(back.image_stamp, snap.image_stamp);
    }

    #[test]
    fn persisted_reference_roundtrip() {
        let snap = DocumentSnapshot::empty()
            .with_image(Some(ImageAsset::from_reference("img_42", 640, 480)));
        let json = serde_json::to_string(&snap).expect("serialize");
        assert!(json.contains("\"imageId\":\"img_42\""));

        let back: DocumentSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.image_stamp, snap.image_stamp);
        assert_eq!(back.image.unwrap().image_id.as_deref(), Some("img_42"));
    }

    #[test]
    fn layer_json_uses_camel_case() {
        let layer = make_layer("l1", 1.0, 2.0);
        let json = serde_json::to_string(&layer).expect("serialize");
        assert!(json.contains("fontFamily"));
        assert!(json.contains("zIndex"));
        assert!(json.contains("\"alignment\":\"center\""));
    }
}
