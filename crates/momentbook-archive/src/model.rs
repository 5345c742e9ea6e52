//! The canonical v3 journey archive.
//!
//! Field names on the wire are camelCase and bit-exact; every string-tagged
//! variant in the format is a closed enumeration here. The normalizer builds
//! these types for the parts it synthesizes, and [`crate::decode`] produces
//! them from a candidate only after the validator has accepted it.

use crate::predicates::Coerced;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// The only schema version this engine emits or accepts.
pub const SCHEMA_VERSION: u32 = 3;

/// The format tag every archive carries.
pub const ARCHIVE_FORMAT: &str = "momentbook.journey-archive";

/// Schema version stamped on recap drafts the normalizer synthesizes.
pub const RECAP_DRAFT_SCHEMA_VERSION: u32 = 1;

/// Legacy exporters grouped photos under this tag before stops and
/// clusters were told apart.
const LEGACY_PHOTO_GROUP: &str = "PHOTO_GROUP";

/// A closed, string-tagged enumeration of the wire format.
pub trait WireEnum: Sized + Copy + 'static {
    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    fn as_wire(self) -> &'static str;

    /// Exact-match lookup of a wire value.
    fn from_wire(text: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.as_wire() == text)
    }

    /// The allowed wire values, comma separated, for error messages.
    fn allowed_values() -> String {
        Self::VARIANTS
            .iter()
            .map(|variant| variant.as_wire())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$variant_meta])* #[serde(rename = $wire)] $variant, )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }
        }

        impl WireEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            fn as_wire(self) -> &'static str {
                self.as_str()
            }
        }
    };
}

wire_enum! {
    /// What a timeline entry asserts about its photos.
    pub enum TimelineItemType {
        /// Photos grouped at a resolved, named place.
        RouteStop => "ROUTE_STOP",
        /// Photos grouped without a resolved place.
        OrphanCluster => "ORPHAN_CLUSTER",
        /// A single photo that joined no group.
        OrphanPhoto => "ORPHAN_PHOTO",
    }
}

wire_enum! {
    /// Confidence of the route reconstruction behind a recap draft.
    pub enum DraftMode {
        RouteStrong => "ROUTE_STRONG",
        RouteWeak => "ROUTE_WEAK",
        RouteNone => "ROUTE_NONE",
    }
}

wire_enum! {
    /// A recorded user edit layered on top of a recap draft.
    pub enum OverrideOpType {
        RouteStopReorder => "ROUTE_STOP_REORDER",
        PhotoRemove => "PHOTO_REMOVE",
        PhotoReassign => "PHOTO_REASSIGN",
    }
}

wire_enum! {
    /// How far the recap of a journey has progressed.
    pub enum RecapStage {
        None => "NONE",
        SystemDone => "SYSTEM_DONE",
        UserDone => "USER_DONE",
    }
}

wire_enum! {
    /// The namespace photo references inside `recap` are expressed in.
    pub enum PhotoIdSpace {
        /// References are root `photos[].photoId` values.
        ExternalId => "EXTERNAL_ID",
    }
}

impl TimelineItemType {
    /// Map a source `type` onto the canonical set.
    ///
    /// Canonical values pass through. A legacy `PHOTO_GROUP` becomes a
    /// route stop only when it names a place. Anything else falls back to
    /// `ORPHAN_CLUSTER`, which claims grouping but neither a place nor a
    /// singleton; that fallback is reported as defaulted.
    pub fn infer(raw_type: Option<&str>, location_name: Option<&str>) -> Coerced<Self> {
        let has_place = location_name.is_some_and(|name| !name.trim().is_empty());
        match raw_type {
            Some("ROUTE_STOP") => Coerced::kept(Self::RouteStop),
            Some("ORPHAN_CLUSTER") => Coerced::kept(Self::OrphanCluster),
            Some("ORPHAN_PHOTO") => Coerced::kept(Self::OrphanPhoto),
            Some(LEGACY_PHOTO_GROUP) if has_place => Coerced::kept(Self::RouteStop),
            Some(LEGACY_PHOTO_GROUP) => Coerced::kept(Self::OrphanCluster),
            _unrecognized => Coerced::defaulted(Self::OrphanCluster),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// The root document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyArchive {
    pub schema_version: u32,
    pub format: String,
    /// ISO-8601.
    pub exported_at: String,
    pub journey: Journey,
    /// Chronological narrative order.
    pub timeline: Vec<TimelineItem>,
    pub photos: Vec<PhotoItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recap: Option<Recap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
}

/// Trip-level metadata. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub id: String,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_temporary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recap_stage: Option<RecapStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recap_system_done_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recap_user_done_at: Option<i64>,
    /// Free-form; carries `title` and `description`.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Journey {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    pub timeline_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Number>,
    #[serde(rename = "type")]
    pub item_type: TimelineItemType,
    pub start_at: i64,
    pub end_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Display order within the stop.
    pub photo_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItem {
    pub photo_id: String,
    pub taken_at: i64,
    /// Relative path into the accompanying media bundle.
    pub archive_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_gps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// `None` when absent, `Some(None)` for an explicit `null`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub caption: Option<Option<String>>,
}

/// Wraps whatever is present (including `null`) in `Some`, so absence
/// stays distinguishable through `#[serde(default)]`.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recap {
    pub photo_id_space: PhotoIdSpace,
    pub draft: RecapDraft,
    pub overrides: RecapOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecapDraft {
    pub schema_version: u32,
    pub draft_id: String,
    pub mode: DraftMode,
    pub created_at: i64,
    pub updated_at: i64,
    pub journey: DraftJourney,
    pub timeline: Vec<DraftTimelineItem>,
    pub photos: Vec<DraftPhoto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftJourney {
    pub journey_id: String,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    pub location_sample_count: i64,
    pub photo_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftTimelineItem {
    pub timeline_id: String,
    #[serde(rename = "type")]
    pub item_type: TimelineItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub time: DraftTime,
    pub photo_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftTime {
    pub start_at: i64,
    pub end_at: i64,
    pub duration_ms: i64,
}

impl DraftTime {
    /// Duration is clamped at zero so inverted source times never yield a
    /// negative span.
    pub fn spanning(start_at: i64, end_at: i64) -> Self {
        Self {
            start_at,
            end_at,
            duration_ms: end_at.saturating_sub(start_at).max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPhoto {
    pub photo_id: String,
    pub taken_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_gps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecapOverrides {
    pub ops: Vec<OverrideOp>,
    pub hidden_photo_ids: Vec<String>,
    pub manual_assignments: Vec<ManualAssignment>,
    /// Opaque to this engine.
    #[serde(default)]
    pub manual_cluster_edits: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_order: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideOp {
    #[serde(rename = "type")]
    pub op_type: OverrideOpType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
    /// Op-specific payload (reorder indices and the like).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAssignment {
    pub photo_id: String,
    pub target_cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// Must equal `photos.len()`; partial documents are not supported yet.
    pub included_photo_count: i64,
    /// Informational only.
    #[serde(default)]
    pub skipped_photo_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_types_pass_through() {
        for variant in TimelineItemType::VARIANTS {
            let inferred = TimelineItemType::infer(Some(variant.as_str()), None);
            assert_eq!(inferred, Coerced::kept(*variant));
        }
    }

    #[test]
    fn photo_group_with_place_is_route_stop() {
        let inferred = TimelineItemType::infer(Some("PHOTO_GROUP"), Some("Kyoto Station"));
        assert_eq!(inferred.value, TimelineItemType::RouteStop);
        assert!(!inferred.defaulted);
    }

    #[test]
    fn photo_group_without_place_is_orphan_cluster() {
        for name in [None, Some(""), Some("  ")] {
            let inferred = TimelineItemType::infer(Some("PHOTO_GROUP"), name);
            assert_eq!(inferred.value, TimelineItemType::OrphanCluster);
        }
    }

    #[test]
    fn unknown_type_falls_back_to_orphan_cluster() {
        let inferred = TimelineItemType::infer(Some("LEGACY_X"), Some("Somewhere"));
        assert_eq!(inferred, Coerced::defaulted(TimelineItemType::OrphanCluster));
        let inferred = TimelineItemType::infer(None, None);
        assert_eq!(inferred, Coerced::defaulted(TimelineItemType::OrphanCluster));
    }

    #[test]
    fn enum_wire_names() {
        assert_eq!(
            serde_json::to_value(DraftMode::RouteStrong).unwrap(),
            json!("ROUTE_STRONG")
        );
        assert_eq!(
            OverrideOpType::from_wire("PHOTO_REASSIGN"),
            Some(OverrideOpType::PhotoReassign)
        );
        assert_eq!(OverrideOpType::from_wire("photo_reassign"), None);
        assert_eq!(
            TimelineItemType::allowed_values(),
            "ROUTE_STOP, ORPHAN_CLUSTER, ORPHAN_PHOTO"
        );
        assert_eq!(RecapStage::SystemDone.as_str(), "SYSTEM_DONE");
    }

    #[test]
    fn caption_keeps_null_distinct_from_absent() {
        let base = json!({"photoId": "p1", "takenAt": 1, "archivePath": "media/p1.jpg"});

        let absent: PhotoItem = serde_json::from_value(base.clone()).unwrap();
        assert_eq!(absent.caption, None);

        let mut with_null = base.clone();
        with_null["caption"] = Value::Null;
        let null: PhotoItem = serde_json::from_value(with_null).unwrap();
        assert_eq!(null.caption, Some(None));
        assert_eq!(serde_json::to_value(&null).unwrap()["caption"], Value::Null);

        let mut with_text = base;
        with_text["caption"] = json!("sunset");
        let text: PhotoItem = serde_json::from_value(with_text).unwrap();
        assert_eq!(text.caption, Some(Some("sunset".to_string())));
    }

    #[test]
    fn draft_time_never_negative() {
        assert_eq!(DraftTime::spanning(100, 250).duration_ms, 150);
        assert_eq!(DraftTime::spanning(250, 100).duration_ms, 0);
    }

    #[test]
    fn override_op_keeps_payload_fields() {
        let op: OverrideOp = serde_json::from_value(json!({
            "type": "ROUTE_STOP_REORDER",
            "fromIndex": 0,
            "toIndex": 2
        }))
        .unwrap();
        assert_eq!(op.op_type, OverrideOpType::RouteStopReorder);
        assert_eq!(op.photo_id, None);
        assert_eq!(op.extra.get("toIndex"), Some(&json!(2)));

        let back = serde_json::to_value(&op).unwrap();
        assert_eq!(back, json!({"type": "ROUTE_STOP_REORDER", "fromIndex": 0, "toIndex": 2}));
    }
}
