//! Best-effort coercion of any export into a candidate v3 archive.
//!
//! Normalization never fails. Missing or mistyped fields are replaced with
//! computed defaults, and every replacement is recorded by path. The
//! result is a candidate, not a verdict: duplicate photo ids, dangling
//! references, and count mismatches are carried through untouched for the
//! validator to report.

use crate::model::{
    ARCHIVE_FORMAT, DraftJourney, DraftMode, DraftPhoto, DraftTime, DraftTimelineItem, GeoPoint,
    Journey, Media, PhotoIdSpace, PhotoItem, RECAP_DRAFT_SCHEMA_VERSION, RecapDraft,
    RecapOverrides, RecapStage, SCHEMA_VERSION, TimelineItem, TimelineItemType, WireEnum,
};
use crate::predicates::{
    Coerced, coerce_optional, coerce_required, epoch_millis, is_timestamp_str, lat_lng,
    string_like, whole_number,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// A normalized candidate and the paths where defaults were substituted,
/// in traversal order.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub archive: Value,
    pub defaulted: Vec<String>,
}

/// Normalize against the current instant.
pub fn normalize_archive(raw: &Value) -> Value {
    normalize_archive_at(raw, Utc::now()).archive
}

/// Normalize with `now` standing in for a missing or malformed
/// `exportedAt`. Identical inputs yield identical output.
pub fn normalize_archive_at(raw: &Value, now: DateTime<Utc>) -> Normalized {
    let mut normalizer = Normalizer {
        now,
        defaulted: Vec::new(),
    };
    let archive = normalizer.archive(raw);
    tracing::debug!(
        defaulted = normalizer.defaulted.len(),
        "normalized journey archive"
    );
    Normalized {
        archive,
        defaulted: normalizer.defaulted,
    }
}

/// Read-only view over a source object that may not be an object at all.
#[derive(Clone, Copy)]
struct Source<'a>(Option<&'a Map<String, Value>>);

impl<'a> Source<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        Self(value.and_then(Value::as_object))
    }

    fn get(self, key: &str) -> Option<&'a Value> {
        self.0.and_then(|object| object.get(key))
    }

    fn is_object(self) -> bool {
        self.0.is_some()
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn owned_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn geo_point(value: &Value) -> Option<GeoPoint> {
    lat_lng(value).map(GeoPoint::from)
}

fn saturating_count(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

struct Normalizer {
    now: DateTime<Utc>,
    defaulted: Vec<String>,
}

impl Normalizer {
    fn record(&mut self, path: impl Into<String>) {
        let path = path.into();
        tracing::debug!(path = %path, "substituted default during normalization");
        self.defaulted.push(path);
    }

    fn take<T>(&mut self, path: impl Into<String>, coerced: Coerced<T>) -> T {
        if coerced.defaulted {
            self.record(path);
        }
        coerced.value
    }

    fn archive(&mut self, raw: &Value) -> Value {
        if !raw.is_object() {
            self.record("$");
        }
        let source = Source::of(Some(raw));

        let now = self.now;
        let exported_at = self.take(
            "exportedAt",
            coerce_required(
                source.get("exportedAt"),
                |value| value.as_str().filter(|text| is_timestamp_str(text)).map(str::to_string),
                || now.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );

        let journey = self.journey(source.get("journey"));
        let mut timeline = Vec::new();
        let mut timeline_wire = Vec::new();
        for (index, item) in self
            .items(source.get("timeline"), "timeline")
            .iter()
            .enumerate()
        {
            let (item, refs) = self.timeline_item(item, index);
            let mut wire = json!(item);
            wire["photoIds"] = Value::Array(refs);
            timeline_wire.push(wire);
            timeline.push(item);
        }
        let photos: Vec<PhotoItem> = self
            .items(source.get("photos"), "photos")
            .iter()
            .enumerate()
            .map(|(index, photo)| self.photo(photo, index))
            .collect();
        let recap = self.recap(source.get("recap"), &journey, &timeline, &photos);
        let media = self.media(source.get("media"), photos.len());

        json!({
            "schemaVersion": SCHEMA_VERSION,
            "format": ARCHIVE_FORMAT,
            "exportedAt": exported_at,
            "journey": journey,
            "timeline": timeline_wire,
            "photos": photos,
            "recap": recap,
            "media": media,
        })
    }

    /// The entries of a source collection; anything but an array is empty.
    fn items<'a>(&mut self, value: Option<&'a Value>, path: &str) -> &'a [Value] {
        match value.and_then(Value::as_array) {
            Some(items) => items,
            None => {
                self.record(path);
                &[]
            }
        }
    }

    fn journey(&mut self, value: Option<&Value>) -> Journey {
        let source = Source::of(value);
        if !source.is_object() {
            self.record("journey");
        }

        let id = self.take(
            "journey.id",
            coerce_required(source.get("id"), string_like, String::new),
        );
        let started_at = self.take(
            "journey.startedAt",
            coerce_required(source.get("startedAt"), epoch_millis, || 0),
        );
        let ended_at = self.take(
            "journey.endedAt",
            coerce_optional(source.get("endedAt"), epoch_millis),
        );
        let is_temporary = self.take(
            "journey.isTemporary",
            coerce_optional(source.get("isTemporary"), Value::as_bool),
        );
        let is_archived = self.take(
            "journey.isArchived",
            coerce_optional(source.get("isArchived"), Value::as_bool),
        );
        let recap_stage = self.take(
            "journey.recapStage",
            coerce_optional(source.get("recapStage"), |value| {
                value.as_str().and_then(RecapStage::from_wire)
            }),
        );
        let recap_system_done_at = self.take(
            "journey.recapSystemDoneAt",
            coerce_optional(source.get("recapSystemDoneAt"), epoch_millis),
        );
        let recap_user_done_at = self.take(
            "journey.recapUserDoneAt",
            coerce_optional(source.get("recapUserDoneAt"), epoch_millis),
        );
        let metadata = self.journey_metadata(source);
        let created_at = self.take(
            "journey.createdAt",
            coerce_required(source.get("createdAt"), epoch_millis, || started_at),
        );
        let updated_at = self.take(
            "journey.updatedAt",
            coerce_required(source.get("updatedAt"), epoch_millis, || started_at),
        );

        Journey {
            id,
            started_at,
            ended_at,
            is_temporary,
            is_archived,
            recap_stage,
            recap_system_done_at,
            recap_user_done_at,
            metadata,
            created_at,
            updated_at,
        }
    }

    /// Nested `metadata` wins; top-level `title`/`description` only fill
    /// keys it lacks.
    fn journey_metadata(&mut self, source: Source<'_>) -> Map<String, Value> {
        let mut metadata = match present(source.get("metadata")) {
            Some(Value::Object(nested)) => nested.clone(),
            Some(_) => {
                self.record("journey.metadata");
                Map::new()
            }
            None => Map::new(),
        };
        for key in ["title", "description"] {
            if !metadata.get(key).is_none_or(Value::is_null) {
                continue;
            }
            if let Some(fallback) = source.get(key).filter(|value| value.is_string()) {
                metadata.insert(key.to_string(), fallback.clone());
            }
        }
        metadata
    }

    /// The typed item carries the recoverable photo ids; the second value
    /// is every `photoIds` entry as it goes on the wire.
    fn timeline_item(&mut self, value: &Value, index: usize) -> (TimelineItem, Vec<Value>) {
        let path = format!("timeline[{index}]");
        let source = Source::of(Some(value));
        if !source.is_object() {
            self.record(path.clone());
        }

        let timeline_id = self.take(
            format!("{path}.timelineId"),
            coerce_required(source.get("timelineId"), string_like, String::new),
        );
        let order = self.take(
            format!("{path}.order"),
            coerce_optional(source.get("order"), |value| value.as_number().cloned()),
        );
        let location_name = self.take(
            format!("{path}.locationName"),
            coerce_optional(source.get("locationName"), owned_str),
        );
        let item_type = self.take(
            format!("{path}.type"),
            TimelineItemType::infer(
                source.get("type").and_then(Value::as_str),
                location_name.as_deref(),
            ),
        );
        let start_at = self.take(
            format!("{path}.startAt"),
            coerce_required(source.get("startAt"), epoch_millis, || 0),
        );
        let end_at = self.take(
            format!("{path}.endAt"),
            coerce_required(source.get("endAt"), epoch_millis, || start_at),
        );
        let location = self.take(
            format!("{path}.location"),
            coerce_optional(source.get("location"), geo_point),
        );
        let refs = self.photo_refs(source.get("photoIds"), &format!("{path}.photoIds"));
        let photo_ids = refs
            .iter()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect();

        let item = TimelineItem {
            timeline_id,
            order,
            item_type,
            start_at,
            end_at,
            location_name,
            location,
            photo_ids,
        };
        (item, refs)
    }

    /// Photo references coerced like `photos[].photoId`. Entries that are
    /// not id-like are kept as they are for the validator to report.
    fn photo_refs(&mut self, value: Option<&Value>, path: &str) -> Vec<Value> {
        let Some(entries) = value.and_then(Value::as_array) else {
            self.record(path);
            return Vec::new();
        };
        entries
            .iter()
            .map(|entry| match string_like(entry) {
                Some(id) => Value::String(id),
                None => entry.clone(),
            })
            .collect()
    }

    fn photo(&mut self, value: &Value, index: usize) -> PhotoItem {
        let path = format!("photos[{index}]");
        let source = Source::of(Some(value));
        if !source.is_object() {
            self.record(path.clone());
        }

        let photo_id = self.take(
            format!("{path}.photoId"),
            coerce_required(source.get("photoId"), string_like, String::new),
        );
        let taken_at = self.take(
            format!("{path}.takenAt"),
            coerce_required(source.get("takenAt"), epoch_millis, || 0),
        );
        let archive_path = self.take(
            format!("{path}.archivePath"),
            coerce_required(source.get("archivePath"), owned_str, String::new),
        );
        let source_uri = self.take(
            format!("{path}.sourceUri"),
            coerce_optional(source.get("sourceUri"), owned_str),
        );
        let has_gps = self.take(
            format!("{path}.hasGps"),
            coerce_optional(source.get("hasGps"), Value::as_bool),
        );
        let location = self.take(
            format!("{path}.location"),
            coerce_optional(source.get("location"), geo_point),
        );
        let caption = match source.get("caption") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(text)) => Some(Some(text.clone())),
            Some(_) => {
                self.record(format!("{path}.caption"));
                None
            }
        };

        PhotoItem {
            photo_id,
            taken_at,
            archive_path,
            source_uri,
            has_gps,
            location,
            caption,
        }
    }

    /// A source draft or overrides block is carried over verbatim; only
    /// absent parts are synthesized.
    fn recap(
        &mut self,
        value: Option<&Value>,
        journey: &Journey,
        timeline: &[TimelineItem],
        photos: &[PhotoItem],
    ) -> Value {
        let source = Source::of(present(value));
        if !source.is_object() {
            self.record("recap");
        }

        let photo_id_space = match source.get("photoIdSpace").and_then(Value::as_str) {
            Some(space) => space.to_string(),
            None => {
                if source.is_object() {
                    self.record("recap.photoIdSpace");
                }
                PhotoIdSpace::ExternalId.as_str().to_string()
            }
        };

        let draft = match present(source.get("draft")) {
            Some(draft) => draft.clone(),
            None => {
                if source.is_object() {
                    self.record("recap.draft");
                }
                json!(synthesize_draft(journey, timeline, photos))
            }
        };

        let overrides = match present(source.get("overrides")) {
            Some(overrides) => overrides.clone(),
            None => {
                if source.is_object() {
                    self.record("recap.overrides");
                }
                json!(RecapOverrides::default())
            }
        };

        json!({
            "photoIdSpace": photo_id_space,
            "draft": draft,
            "overrides": overrides,
        })
    }

    /// Source counts are kept as claimed, even when they disagree with
    /// `photos`; the validator reports the mismatch.
    fn media(&mut self, value: Option<&Value>, photo_count: usize) -> Media {
        let included_fallback = saturating_count(photo_count);
        let source = Source::of(present(value));
        if !source.is_object() {
            self.record("media");
            return Media {
                included_photo_count: included_fallback,
                skipped_photo_count: 0,
            };
        }

        let included_photo_count = self.take(
            "media.includedPhotoCount",
            coerce_required(source.get("includedPhotoCount"), whole_number, || {
                included_fallback
            }),
        );
        let skipped_photo_count = self.take(
            "media.skippedPhotoCount",
            coerce_required(source.get("skippedPhotoCount"), whole_number, || 0),
        );
        Media {
            included_photo_count,
            skipped_photo_count,
        }
    }
}

/// Build a recap draft from the already-normalized timeline and photos.
fn synthesize_draft(journey: &Journey, timeline: &[TimelineItem], photos: &[PhotoItem]) -> RecapDraft {
    let location_sample_count = timeline
        .iter()
        .filter(|item| {
            item.location_name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty())
        })
        .count();

    RecapDraft {
        schema_version: RECAP_DRAFT_SCHEMA_VERSION,
        draft_id: derive_draft_id(journey, timeline, photos),
        mode: DraftMode::RouteStrong,
        created_at: journey.created_at,
        updated_at: journey.updated_at,
        journey: DraftJourney {
            journey_id: journey.id.clone(),
            started_at: journey.started_at,
            ended_at: journey.ended_at,
            location_sample_count: saturating_count(location_sample_count),
            photo_count: saturating_count(photos.len()),
        },
        timeline: timeline
            .iter()
            .map(|item| DraftTimelineItem {
                timeline_id: item.timeline_id.clone(),
                item_type: item.item_type,
                location_name: item.location_name.clone(),
                location: item.location,
                time: DraftTime::spanning(item.start_at, item.end_at),
                photo_ids: item.photo_ids.clone(),
            })
            .collect(),
        photos: photos
            .iter()
            .map(|photo| DraftPhoto {
                photo_id: photo.photo_id.clone(),
                taken_at: photo.taken_at,
                has_gps: photo.has_gps,
                location: photo.location,
            })
            .collect(),
    }
}

/// `draft1_` + the first 16 hex digits of SHA-256 over the canonical
/// (sorted-key, compact) JSON of the journey id and the ordered timeline
/// and photo ids.
fn derive_draft_id(journey: &Journey, timeline: &[TimelineItem], photos: &[PhotoItem]) -> String {
    let material = json!({
        "journeyId": journey.id,
        "photoIds": photos.iter().map(|photo| photo.photo_id.as_str()).collect::<Vec<_>>(),
        "timelineIds": timeline.iter().map(|item| item.timeline_id.as_str()).collect::<Vec<_>>(),
    });
    let digest = Sha256::digest(material.to_string().as_bytes());
    let hex = format!("{digest:x}");
    format!("draft1_{}", &hex[..16])
}
