//! Portable history export.
//!
//! Exports wrap the full history in a versioned envelope with every image
//! payload inlined as base64, so the resulting JSON document opens anywhere
//! without access to the original blob store.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use caplab_editor_state::{
    DocumentSnapshot, HistoryEntry, HistoryState, ImageAsset, ImageHandle,
};

use crate::blob::BlobStore;
use crate::error::{StorageError, StorageResult};

/// Version written into every export envelope.
pub const EXPORT_VERSION: &str = "1.0.0";

/// Counts describing an exported history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    /// Total snapshots in the envelope (present + past + future).
    pub total_states: usize,
    /// Whether any exported snapshot carries an image.
    pub has_images: bool,
}

/// Self-contained export envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    /// Envelope format version.
    pub version: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// The full history with images inlined.
    pub history: HistoryState,
    pub metadata: ExportMetadata,
}

/// Build an export envelope from a live history.
///
/// Payloads come from the in-memory handle when present, otherwise from the
/// blob store by reference id. A snapshot whose payload can be found nowhere
/// exports with no image; the export itself still succeeds.
pub fn export_history(history: &HistoryState, blobs: Option<&dyn BlobStore>) -> ExportData {
    let inline_entry = |entry: &HistoryEntry| HistoryEntry {
        snapshot: inline_snapshot(&entry.snapshot, blobs),
        action: entry.action.clone(),
    };
    let inlined = HistoryState {
        past: history.past.iter().map(inline_entry).collect(),
        present: inline_snapshot(&history.present, blobs),
        future: history.future.iter().map(inline_entry).collect(),
        limit: history.limit,
        mode: history.mode,
    };

    let total_states = 1 + inlined.past.len() + inlined.future.len();
    let has_images = inlined.present.image.is_some()
        || inlined.past.iter().any(|e| e.snapshot.image.is_some())
        || inlined.future.iter().any(|e| e.snapshot.image.is_some());

    debug!(total_states, has_images, "Built history export");

    ExportData {
        version: EXPORT_VERSION.to_string(),
        created_at: current_iso_timestamp(),
        history: inlined,
        metadata: ExportMetadata {
            total_states,
            has_images,
        },
    }
}

/// Rebuild a live history from an imported envelope.
///
/// Inlined payloads become fresh in-memory handles; reference ids are not
/// carried over, so the first save after an import stores the payloads into
/// the local blob store. An entry whose base64 fails to decode imports with
/// no image.
pub fn import_history(data: &ExportData) -> HistoryState {
    let hydrate_entry = |entry: &HistoryEntry| HistoryEntry {
        snapshot: hydrate_inlined(&entry.snapshot),
        action: entry.action.clone(),
    };
    HistoryState {
        past: data.history.past.iter().map(hydrate_entry).collect(),
        present: hydrate_inlined(&data.history.present),
        future: data.history.future.iter().map(hydrate_entry).collect(),
        limit: data.history.limit,
        mode: data.history.mode,
    }
}

/// Serialize an export envelope to pretty-printed JSON.
pub fn to_json_string(data: &ExportData) -> StorageResult<String> {
    let json = serde_json::to_string_pretty(data)?;
    debug!(json_len = json.len(), "Serialized history export");
    Ok(json)
}

/// Parse an export envelope, rejecting incompatible format versions.
pub fn from_json_string(json: &str) -> StorageResult<ExportData> {
    let data: ExportData = serde_json::from_str(json)?;
    let major = data.version.split('.').next().unwrap_or("");
    let supported_major = EXPORT_VERSION.split('.').next().unwrap_or("");
    if major != supported_major {
        return Err(StorageError::InvalidRecord {
            reason: format!("unsupported export version: {}", data.version),
        });
    }
    Ok(data)
}

/// Export form of one snapshot: image carried as base64 `data`, handle and
/// reference id both dropped.
fn inline_snapshot(snapshot: &DocumentSnapshot, blobs: Option<&dyn BlobStore>) -> DocumentSnapshot {
    let Some(asset) = &snapshot.image else {
        return snapshot.clone();
    };

    let encoded = if let Some(handle) = &asset.handle {
        Some(BASE64.encode(handle.bytes()))
    } else if let Some(data) = &asset.data {
        Some(data.clone())
    } else if let Some(id) = &asset.image_id {
        match blobs.map(|b| b.get(id)) {
            Some(Ok(Some(bytes))) => Some(BASE64.encode(bytes)),
            Some(Ok(None)) => {
                warn!(blob_id = %id, "Referenced payload missing; exporting without image");
                None
            }
            Some(Err(e)) => {
                warn!(blob_id = %id, error = %e, "Failed to read payload; exporting without image");
                None
            }
            None => {
                warn!(blob_id = %id, "No blob store available; exporting without image");
                None
            }
        }
    } else {
        None
    };

    match encoded {
        Some(data) => snapshot.with_image(Some(ImageAsset {
            handle: None,
            image_id: None,
            data: Some(data),
            width: asset.width,
            height: asset.height,
        })),
        None => snapshot.with_image(None),
    }
}

/// Live form of an exported snapshot: base64 `data` decoded into a handle.
fn hydrate_inlined(snapshot: &DocumentSnapshot) -> DocumentSnapshot {
    let Some(asset) = &snapshot.image else {
        return snapshot.clone();
    };
    let Some(data) = &asset.data else {
        return snapshot.clone();
    };
    match BASE64.decode(data) {
        Ok(bytes) => snapshot.with_image(Some(ImageAsset::from_handle(
            ImageHandle::new(bytes),
            asset.width,
            asset.height,
        ))),
        Err(e) => {
            warn!(error = %e, "Inlined image data failed to decode; importing without image");
            snapshot.with_image(None)
        }
    }
}

/// Current ISO 8601 timestamp, UTC.
fn current_iso_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (year, month, day, hour, min, sec) = epoch_to_datetime(secs);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

/// Convert Unix epoch seconds to (year, month, day, hour, minute, second).
/// Accurate for dates from 1970 onwards.
fn epoch_to_datetime(epoch: u64) -> (u64, u64, u64, u64, u64, u64) {
    let sec = epoch % 60;
    let min = (epoch / 60) % 60;
    let hour = (epoch / 3600) % 24;
    let mut days = epoch / 86400;

    let mut year = 1970u64;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let days_in_months: [u64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 0u64;
    for (i, &dm) in days_in_months.iter().enumerate() {
        if days < dm {
            month = i as u64 + 1;
            break;
        }
        days -= dm;
    }
    let day = days + 1;

    (year, month, day, hour, min, sec)
}

fn is_leap_year(y: u64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use caplab_editor_state::{ActionDescriptor, ActionKind};

    fn image_history(bytes: Vec<u8>) -> HistoryState {
        let h0 = HistoryState::empty();
        h0.commit(
            h0.present
                .with_image(Some(ImageAsset::from_handle(ImageHandle::new(bytes), 320, 240))),
            ActionDescriptor::tagged(ActionKind::SetImage),
        )
    }

    #[test]
    fn export_inlines_in_memory_payloads() {
        let history = image_history(vec![1, 2, 3]);
        let export = export_history(&history, None);

        assert_eq!(export.version, EXPORT_VERSION);
        assert_eq!(export.metadata.total_states, 2);
        assert!(export.metadata.has_images);

        let asset = export.history.present.image.as_ref().expect("image");
        assert!(asset.handle.is_none());
        assert!(asset.image_id.is_none());
        assert_eq!(asset.data.as_deref(), Some(BASE64.encode([1, 2, 3]).as_str()));
    }

    #[test]
    fn export_resolves_references_through_the_store() {
        let blobs = MemoryBlobStore::new();
        blobs.set(&[9, 9, 9], Some("img_ref")).expect("set");

        let h0 = HistoryState::empty();
        let history = h0.commit(
            h0.present
                .with_image(Some(ImageAsset::from_reference("img_ref", 320, 240))),
            ActionDescriptor::tagged(ActionKind::SetImage),
        );
        let export = export_history(&history, Some(&blobs));

        let asset = export.history.present.image.as_ref().expect("image");
        assert_eq!(asset.data.as_deref(), Some(BASE64.encode([9, 9, 9]).as_str()));
        assert!(asset.image_id.is_none());
    }

    #[test]
    fn unresolvable_reference_exports_without_image() {
        let blobs = MemoryBlobStore::new();
        let h0 = HistoryState::empty();
        let history = h0.commit(
            h0.present
                .with_image(Some(ImageAsset::from_reference("img_gone", 320, 240))),
            ActionDescriptor::tagged(ActionKind::SetImage),
        );
        let export = export_history(&history, Some(&blobs));

        assert!(export.history.present.image.is_none());
        // The past entry had no image, so none of the envelope does.
        assert!(!export.metadata.has_images);
        assert_eq!(export.metadata.total_states, 2);
    }

    #[test]
    fn export_json_has_the_envelope_fields() {
        let export = export_history(&image_history(vec![1]), None);
        let json = to_json_string(&export).expect("serialize");
        assert!(json.contains("\"version\": \"1.0.0\""));
        assert!(json.contains("createdAt"));
        assert!(json.contains("totalStates"));
        assert!(json.contains("hasImages"));
        assert!(!json.contains("imageId"));
    }

    #[test]
    fn export_import_roundtrip_restores_payloads() {
        let history = image_history(vec![5, 6, 7]);
        let export = export_history(&history, None);
        let json = to_json_string(&export).expect("serialize");

        let parsed = from_json_string(&json).expect("parse");
        let imported = import_history(&parsed);

        let asset = imported.present.image.expect("image");
        assert_eq!(asset.handle.expect("handle").bytes(), &[5, 6, 7]);
        assert!(asset.image_id.is_none());
        assert_eq!(imported.past.len(), 1);
        assert_eq!(imported.limit, history.limit);
    }

    #[test]
    fn incompatible_version_is_rejected() {
        let mut export = export_history(&HistoryState::empty(), None);
        export.version = "2.0.0".to_string();
        let json = to_json_string(&export).expect("serialize");

        let err = from_json_string(&json).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
    }

    #[test]
    fn import_drops_undecodable_inline_data() {
        let h0 = HistoryState::empty();
        let bad = h0.present.with_image(Some(ImageAsset {
            handle: None,
            image_id: None,
            data: Some("!!! not base64 !!!".to_string()),
            width: 10,
            height: 10,
        }));
        let history = h0.commit(bad, ActionDescriptor::tagged(ActionKind::SetImage));
        let export = ExportData {
            version: EXPORT_VERSION.to_string(),
            created_at: current_iso_timestamp(),
            history,
            metadata: ExportMetadata {
                total_states: 2,
                has_images: true,
            },
        };

        let imported = import_history(&export);
        assert!(imported.present.image.is_none());
    }

    #[test]
    fn timestamp_is_iso_shaped() {
        let ts = current_iso_timestamp();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn epoch_to_datetime_known_date() {
        // 2024-01-01 00:00:00 UTC
        let (y, m, d, h, mi, s) = epoch_to_datetime(1_704_067_200);
        assert_eq!((y, m, d, h, mi, s), (2024, 1, 1, 0, 0, 0));

        // 2026-08-24 12:30:45 UTC
        let (y, m, d, h, mi, s) = epoch_to_datetime(1_787_574_645);
        assert_eq!((y, m, d, h, mi, s), (2026, 8, 24, 12, 30, 45));
    }
}
