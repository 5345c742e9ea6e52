//! Structural and referential validation of a candidate v3 archive.
//!
//! The validator trusts nothing about its input: it does not assume the
//! candidate came from the normalizer. Only the `timeline`/`photos` array
//! prerequisite stops a run early; every other check appends to the same
//! ordered issue list, so one call explains every reason for rejection.
//!
//! Check order (part of the external contract, callers index into it):
//! 1. top level: `schemaVersion`, `format`, `exportedAt`
//! 2. `journey`
//! 3. each `timeline` item, references included
//! 4. `photoId` uniqueness, aggregated into one line
//! 5. each `photos` item
//! 6. `recap`: `photoIdSpace`, then `draft`, then `overrides`
//! 7. `media` count reconciliation

use crate::issue::{ArchiveIssue, IssueClass, ValidationReport};
use crate::model::{
    ARCHIVE_FORMAT, DraftMode, OverrideOpType, PhotoIdSpace, RecapStage, SCHEMA_VERSION,
    TimelineItemType, WireEnum,
};
use crate::predicates::{
    is_finite_number, is_lat_lng, is_non_empty_string, is_timestamp, render_value,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Validate a candidate and return the `{ isValid, errors }` verdict.
pub fn validate_archive(candidate: &Value) -> ValidationReport {
    ValidationReport::from_issues(&collect_archive_issues(candidate))
}

/// Validate a candidate and return the structured issues behind the
/// report, in report order.
pub fn collect_archive_issues(candidate: &Value) -> Vec<ArchiveIssue> {
    let Some(root) = candidate.as_object() else {
        return vec![ArchiveIssue::new(
            IssueClass::Structure,
            "",
            "archive must be an object",
        )];
    };

    let timeline = root.get("timeline").and_then(Value::as_array);
    let photos = root.get("photos").and_then(Value::as_array);
    let (Some(timeline), Some(photos)) = (timeline, photos) else {
        let mut issues = Vec::new();
        if timeline.is_none() {
            issues.push(ArchiveIssue::new(
                IssueClass::Structure,
                "timeline",
                "timeline must be an array",
            ));
        }
        if photos.is_none() {
            issues.push(ArchiveIssue::new(
                IssueClass::Structure,
                "photos",
                "photos must be an array",
            ));
        }
        tracing::debug!(
            issues = issues.len(),
            "journey archive rejected before item checks"
        );
        return issues;
    };

    let mut checker = Checker::new(photos);
    let scope = Scope::root(root);

    checker.check_header(&scope);
    checker.check_journey(scope.field("journey"));
    for (index, item) in timeline.iter().enumerate() {
        checker.check_timeline_item(item, index);
    }
    checker.check_duplicate_photo_ids(photos);
    for (index, photo) in photos.iter().enumerate() {
        checker.check_photo(photo, index);
    }
    if let Some(recap) = present(scope.field("recap")) {
        checker.check_recap(recap);
    }
    if let Some(media) = present(scope.field("media")) {
        checker.check_media(media, photos.len());
    }

    tracing::debug!(
        timeline = timeline.len(),
        photos = photos.len(),
        issues = checker.issues.len(),
        "validated journey archive"
    );
    checker.issues
}

/// Treat an explicit `null` like an absent optional field.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// An object being checked, with the path it lives at.
struct Scope<'v> {
    object: &'v Map<String, Value>,
    path: String,
}

impl<'v> Scope<'v> {
    fn root(object: &'v Map<String, Value>) -> Self {
        Self {
            object,
            path: String::new(),
        }
    }

    fn field(&self, key: &str) -> Option<&'v Value> {
        self.object.get(key)
    }

    fn path_of(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }
}

struct Checker<'v> {
    known_photo_ids: BTreeSet<&'v str>,
    issues: Vec<ArchiveIssue>,
}

impl<'v> Checker<'v> {
    fn new(photos: &'v [Value]) -> Self {
        let known_photo_ids = photos
            .iter()
            .filter_map(|photo| photo.get("photoId").and_then(Value::as_str))
            .filter(|id| !id.trim().is_empty())
            .collect();
        Self {
            known_photo_ids,
            issues: Vec::new(),
        }
    }

    fn report(&mut self, class: IssueClass, path: String, message: String) {
        self.issues.push(ArchiveIssue::new(class, path, message));
    }

    fn contract(&mut self, path: String, expectation: &str) {
        let message = format!("{path} {expectation}");
        self.report(IssueClass::FieldContract, path, message);
    }

    fn object_at(&mut self, value: Option<&'v Value>, path: String) -> Option<Scope<'v>> {
        match value.and_then(Value::as_object) {
            Some(object) => Some(Scope { object, path }),
            None => {
                self.contract(path, "must be an object");
                None
            }
        }
    }

    fn array_at(&mut self, scope: &Scope<'v>, key: &str) -> Option<&'v Vec<Value>> {
        let array = scope.field(key).and_then(Value::as_array);
        if array.is_none() {
            self.contract(scope.path_of(key), "must be an array");
        }
        array
    }

    fn require_non_empty_string(&mut self, scope: &Scope<'v>, key: &str) {
        if !scope.field(key).is_some_and(is_non_empty_string) {
            self.contract(scope.path_of(key), "must be a non-empty string");
        }
    }

    fn require_number(&mut self, scope: &Scope<'v>, key: &str) {
        if !scope.field(key).is_some_and(is_finite_number) {
            self.contract(scope.path_of(key), "must be a finite number");
        }
    }

    fn optional_number(&mut self, scope: &Scope<'v>, key: &str) {
        if present(scope.field(key)).is_some_and(|value| !is_finite_number(value)) {
            self.contract(scope.path_of(key), "must be a finite number");
        }
    }

    fn optional_bool(&mut self, scope: &Scope<'v>, key: &str) {
        if present(scope.field(key)).is_some_and(|value| !value.is_boolean()) {
            self.contract(scope.path_of(key), "must be a boolean");
        }
    }

    fn optional_string(&mut self, scope: &Scope<'v>, key: &str) {
        if present(scope.field(key)).is_some_and(|value| !value.is_string()) {
            self.contract(scope.path_of(key), "must be a string");
        }
    }

    fn optional_lat_lng(&mut self, scope: &Scope<'v>, key: &str) {
        if present(scope.field(key)).is_some_and(|value| !is_lat_lng(value)) {
            self.contract(scope.path_of(key), "must be a {lat, lng} pair");
        }
    }

    fn require_enum<E: WireEnum>(&mut self, scope: &Scope<'v>, key: &str) {
        let value = scope.field(key);
        let known = value
            .and_then(Value::as_str)
            .and_then(E::from_wire)
            .is_some();
        if !known {
            let path = scope.path_of(key);
            let message = format!(
                "{path} must be one of {}, got {}",
                E::allowed_values(),
                render_value(value)
            );
            self.report(IssueClass::FieldContract, path, message);
        }
    }

    fn optional_enum<E: WireEnum>(&mut self, scope: &Scope<'v>, key: &str) {
        if present(scope.field(key)).is_some() {
            self.require_enum::<E>(scope, key);
        }
    }

    /// One photo reference. `site` names the reference in the message;
    /// `path` locates it exactly.
    fn check_photo_ref(&mut self, value: &Value, site: &str, path: String) {
        let Some(id) = value.as_str().filter(|id| !id.trim().is_empty()) else {
            self.contract(path, "must be a non-empty string");
            return;
        };
        if !self.known_photo_ids.contains(id) {
            let message = format!("{site} \"{id}\" not found in photos");
            self.report(IssueClass::Reference, path, message);
        }
    }

    /// A list of photo references. Absent lists are an error only when
    /// `required`.
    fn check_photo_ref_list(&mut self, scope: &Scope<'v>, key: &str, site: &str, required: bool) {
        let path = scope.path_of(key);
        let Some(value) = present(scope.field(key)) else {
            if required {
                self.contract(path, "must be an array");
            }
            return;
        };
        let Some(entries) = value.as_array() else {
            self.contract(path, "must be an array");
            return;
        };
        for (index, entry) in entries.iter().enumerate() {
            self.check_photo_ref(entry, site, format!("{path}[{index}]"));
        }
    }

    fn check_header(&mut self, scope: &Scope<'v>) {
        let schema_version = scope.field("schemaVersion");
        let is_current = schema_version
            .and_then(Value::as_f64)
            .is_some_and(|version| version == f64::from(SCHEMA_VERSION));
        if !is_current {
            let message = format!(
                "schemaVersion must be {SCHEMA_VERSION}, got {}",
                render_value(schema_version)
            );
            self.report(
                IssueClass::FieldContract,
                "schemaVersion".to_string(),
                message,
            );
        }

        let format = scope.field("format");
        if format.and_then(Value::as_str) != Some(ARCHIVE_FORMAT) {
            let message = format!(
                "format must be {ARCHIVE_FORMAT}, got {}",
                render_value(format)
            );
            self.report(IssueClass::FieldContract, "format".to_string(), message);
        }

        let exported_at = scope.field("exportedAt");
        if !exported_at.is_some_and(is_timestamp) {
            let message = format!(
                "exportedAt must be a valid ISO-8601 timestamp, got {}",
                render_value(exported_at)
            );
            self.report(IssueClass::FieldContract, "exportedAt".to_string(), message);
        }
    }

    fn check_journey(&mut self, journey: Option<&'v Value>) {
        let Some(scope) = self.object_at(journey, "journey".to_string()) else {
            return;
        };
        self.require_non_empty_string(&scope, "id");
        self.require_number(&scope, "startedAt");
        self.optional_number(&scope, "endedAt");
        self.optional_bool(&scope, "isTemporary");
        self.optional_bool(&scope, "isArchived");
        self.optional_enum::<RecapStage>(&scope, "recapStage");
        self.optional_number(&scope, "recapSystemDoneAt");
        self.optional_number(&scope, "recapUserDoneAt");
        if present(scope.field("metadata")).is_some_and(|metadata| !metadata.is_object()) {
            self.contract(scope.path_of("metadata"), "must be an object");
        }
        self.require_number(&scope, "createdAt");
        self.require_number(&scope, "updatedAt");
    }

    fn check_timeline_item(&mut self, item: &'v Value, index: usize) {
        let path = format!("timeline[{index}]");
        let Some(scope) = self.object_at(Some(item), path.clone()) else {
            return;
        };
        self.require_non_empty_string(&scope, "timelineId");
        self.optional_number(&scope, "order");
        self.require_enum::<TimelineItemType>(&scope, "type");
        self.require_number(&scope, "startAt");
        self.require_number(&scope, "endAt");
        self.optional_string(&scope, "locationName");
        self.optional_lat_lng(&scope, "location");
        self.check_photo_ref_list(&scope, "photoIds", &format!("{path}.photoId"), true);
    }

    /// Reported as a single aggregated line, unlike every other
    /// reference check. Existing consumers match on this shape.
    fn check_duplicate_photo_ids(&mut self, photos: &'v [Value]) {
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        let mut duplicates = Vec::new();
        for id in photos
            .iter()
            .filter_map(|photo| photo.get("photoId").and_then(Value::as_str))
        {
            if !seen.insert(id) && reported.insert(id) {
                duplicates.push(id);
            }
        }
        if !duplicates.is_empty() {
            let message = format!("Duplicate photoId(s): {}", duplicates.join(", "));
            self.report(IssueClass::Reference, "photos".to_string(), message);
        }
    }

    fn check_photo(&mut self, photo: &'v Value, index: usize) {
        let Some(scope) = self.object_at(Some(photo), format!("photos[{index}]")) else {
            return;
        };
        self.require_non_empty_string(&scope, "photoId");
        self.require_number(&scope, "takenAt");
        self.require_non_empty_string(&scope, "archivePath");
        self.optional_string(&scope, "sourceUri");
        self.optional_bool(&scope, "hasGps");
        self.optional_lat_lng(&scope, "location");
        // `null` is a legitimate caption, distinct from absence.
        if scope
            .field("caption")
            .is_some_and(|caption| !caption.is_null() && !caption.is_string())
        {
            self.contract(scope.path_of("caption"), "must be a string or null");
        }
    }

    fn check_recap(&mut self, recap: &'v Value) {
        let Some(scope) = self.object_at(Some(recap), "recap".to_string()) else {
            return;
        };

        let space = scope.field("photoIdSpace");
        let expected = PhotoIdSpace::ExternalId.as_str();
        if space.and_then(Value::as_str) != Some(expected) {
            let path = scope.path_of("photoIdSpace");
            let message = format!("{path} must be {expected}, got {}", render_value(space));
            self.report(IssueClass::FieldContract, path, message);
        }

        if let Some(draft) = self.object_at(scope.field("draft"), scope.path_of("draft")) {
            self.check_draft(&draft);
        }
        if let Some(overrides) = self.object_at(scope.field("overrides"), scope.path_of("overrides"))
        {
            self.check_overrides(&overrides);
        }
    }

    fn check_draft(&mut self, draft: &Scope<'v>) {
        self.require_number(draft, "schemaVersion");
        self.require_non_empty_string(draft, "draftId");
        self.require_enum::<DraftMode>(draft, "mode");
        self.require_number(draft, "createdAt");
        self.require_number(draft, "updatedAt");

        if let Some(journey) = self.object_at(draft.field("journey"), draft.path_of("journey")) {
            self.require_non_empty_string(&journey, "journeyId");
            self.require_number(&journey, "startedAt");
            self.optional_number(&journey, "endedAt");
            self.require_number(&journey, "locationSampleCount");
            self.require_number(&journey, "photoCount");
        }

        if let Some(timeline) = self.array_at(draft, "timeline") {
            for (index, item) in timeline.iter().enumerate() {
                let path = format!("{}[{index}]", draft.path_of("timeline"));
                let Some(scope) = self.object_at(Some(item), path.clone()) else {
                    continue;
                };
                self.require_non_empty_string(&scope, "timelineId");
                self.require_enum::<TimelineItemType>(&scope, "type");
                self.optional_string(&scope, "locationName");
                self.optional_lat_lng(&scope, "location");
                if let Some(time) = self.object_at(scope.field("time"), scope.path_of("time")) {
                    self.require_number(&time, "startAt");
                    self.require_number(&time, "endAt");
                    self.require_number(&time, "durationMs");
                }
                self.check_photo_ref_list(&scope, "photoIds", &format!("{path}.photoId"), true);
            }
        }

        if let Some(photos) = self.array_at(draft, "photos") {
            for (index, photo) in photos.iter().enumerate() {
                let path = format!("{}[{index}]", draft.path_of("photos"));
                let Some(scope) = self.object_at(Some(photo), path) else {
                    continue;
                };
                let site = scope.path_of("photoId");
                match scope.field("photoId") {
                    Some(id) => self.check_photo_ref(id, &site, site.clone()),
                    None => self.contract(site, "must be a non-empty string"),
                }
                self.require_number(&scope, "takenAt");
                self.optional_bool(&scope, "hasGps");
                self.optional_lat_lng(&scope, "location");
            }
        }
    }

    fn check_overrides(&mut self, overrides: &Scope<'v>) {
        if let Some(ops) = self.array_at(overrides, "ops") {
            for (index, op) in ops.iter().enumerate() {
                let path = format!("{}[{index}]", overrides.path_of("ops"));
                let Some(scope) = self.object_at(Some(op), path) else {
                    continue;
                };
                self.require_enum::<OverrideOpType>(&scope, "type");
                if let Some(id) = present(scope.field("photoId")) {
                    let site = scope.path_of("photoId");
                    self.check_photo_ref(id, &site, site.clone());
                }
            }
        }

        let hidden_site = overrides.path_of("hiddenPhotoIds");
        self.check_photo_ref_list(overrides, "hiddenPhotoIds", &hidden_site, true);

        if let Some(assignments) = self.array_at(overrides, "manualAssignments") {
            for (index, assignment) in assignments.iter().enumerate() {
                let path = format!("{}[{index}]", overrides.path_of("manualAssignments"));
                let Some(scope) = self.object_at(Some(assignment), path) else {
                    continue;
                };
                let site = scope.path_of("photoId");
                match scope.field("photoId") {
                    Some(id) => self.check_photo_ref(id, &site, site.clone()),
                    None => self.contract(site, "must be a non-empty string"),
                }
                self.require_non_empty_string(&scope, "targetClusterId");
                self.optional_number(&scope, "positionIndex");
            }
        }

        if present(overrides.field("manualClusterEdits")).is_some_and(|edits| !edits.is_array()) {
            self.contract(overrides.path_of("manualClusterEdits"), "must be an array");
        }

        let block_site = overrides.path_of("blockOrder");
        self.check_photo_ref_list(overrides, "blockOrder", &block_site, false);
    }

    fn check_media(&mut self, media: &'v Value, photo_count: usize) {
        let Some(scope) = self.object_at(Some(media), "media".to_string()) else {
            return;
        };

        let included = scope.field("includedPhotoCount");
        let matches = included
            .filter(|value| is_finite_number(value))
            .and_then(Value::as_f64)
            .is_some_and(|count| count == photo_count as f64);
        if !matches {
            let path = scope.path_of("includedPhotoCount");
            let message = format!(
                "{path} must equal photos.length (expected {photo_count}, got {})",
                render_value(included)
            );
            self.report(IssueClass::Count, path, message);
        }

        self.optional_number(&scope, "skippedPhotoCount");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_archive() -> Value {
        json!({
            "schemaVersion": 3,
            "format": "momentbook.journey-archive",
            "exportedAt": "2024-05-01T10:00:00.000Z",
            "journey": {
                "id": "j1",
                "startedAt": 1000,
                "metadata": {},
                "createdAt": 1000,
                "updatedAt": 1000
            },
            "timeline": [{
                "timelineId": "t1",
                "type": "ROUTE_STOP",
                "startAt": 1000,
                "endAt": 2000,
                "locationName": "Harbor",
                "photoIds": ["p1"]
            }],
            "photos": [{
                "photoId": "p1",
                "takenAt": 1500,
                "archivePath": "media/p1.jpg"
            }],
            "media": {"includedPhotoCount": 1, "skippedPhotoCount": 0}
        })
    }

    #[test]
    fn minimal_archive_is_valid() {
        let report = validate_archive(&minimal_archive());
        assert!(report.is_valid, "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn non_object_candidate_degrades_to_error() {
        let report = validate_archive(&json!([1, 2, 3]));
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["archive must be an object"]);
    }

    #[test]
    fn missing_collections_stop_validation() {
        let report = validate_archive(&json!({"schemaVersion": 2}));
        assert_eq!(
            report.errors,
            vec!["timeline must be an array", "photos must be an array"]
        );

        let mut archive = minimal_archive();
        archive["photos"] = json!({"p1": {}});
        archive["format"] = json!("legacy");
        let report = validate_archive(&archive);
        assert_eq!(report.errors, vec!["photos must be an array"]);
    }

    #[test]
    fn null_optional_fields_are_absent() {
        let mut archive = minimal_archive();
        archive["journey"]["endedAt"] = Value::Null;
        archive["recap"] = Value::Null;
        archive["photos"][0]["caption"] = Value::Null;
        let report = validate_archive(&archive);
        assert!(report.is_valid, "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn caption_must_be_string_or_null() {
        let mut archive = minimal_archive();
        archive["photos"][0]["caption"] = json!(42);
        let report = validate_archive(&archive);
        assert_eq!(report.errors, vec!["photos[0].caption must be a string or null"]);
    }

    #[test]
    fn recap_stage_is_enumerated() {
        let mut archive = minimal_archive();
        archive["journey"]["recapStage"] = json!("HALF_DONE");
        let report = validate_archive(&archive);
        assert_eq!(
            report.errors,
            vec!["journey.recapStage must be one of NONE, SYSTEM_DONE, USER_DONE, got \"HALF_DONE\""]
        );
    }

    #[test]
    fn non_string_photo_reference_is_a_contract_issue() {
        let mut archive = minimal_archive();
        archive["timeline"][0]["photoIds"] = json!(["p1", 7]);
        let issues = collect_archive_issues(&archive);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].class, IssueClass::FieldContract);
        assert_eq!(issues[0].path, "timeline[0].photoIds[1]");
        assert_eq!(
            issues[0].message,
            "timeline[0].photoIds[1] must be a non-empty string"
        );
    }

    #[test]
    fn dangling_reference_is_classified() {
        let mut archive = minimal_archive();
        archive["timeline"][0]["photoIds"] = json!(["p1", "ghost"]);
        let issues = collect_archive_issues(&archive);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].class, IssueClass::Reference);
        assert_eq!(issues[0].path, "timeline[0].photoIds[1]");
        assert_eq!(
            issues[0].message,
            "timeline[0].photoId \"ghost\" not found in photos"
        );
    }

    #[test]
    fn duplicates_listed_once_each() {
        let mut archive = minimal_archive();
        let photo = archive["photos"][0].clone();
        let mut other = photo.clone();
        other["photoId"] = json!("p2");
        archive["photos"] = json!([photo.clone(), other.clone(), photo.clone(), photo, other]);
        archive["media"]["includedPhotoCount"] = json!(5);
        let report = validate_archive(&archive);
        assert_eq!(report.errors, vec!["Duplicate photoId(s): p1, p2"]);
    }

    #[test]
    fn media_count_message_carries_both_values() {
        let mut archive = minimal_archive();
        archive["media"]["includedPhotoCount"] = json!(0);
        let report = validate_archive(&archive);
        assert_eq!(
            report.errors,
            vec!["media.includedPhotoCount must equal photos.length (expected 1, got 0)"]
        );
    }

    #[test]
    fn skipped_count_is_not_cross_checked() {
        let mut archive = minimal_archive();
        archive["media"]["skippedPhotoCount"] = json!(12);
        assert!(validate_archive(&archive).is_valid);
    }

    #[test]
    fn media_is_optional() {
        let mut archive = minimal_archive();
        archive.as_object_mut().unwrap().remove("media");
        assert!(validate_archive(&archive).is_valid);
    }

    #[test]
    fn inverted_times_are_not_rejected() {
        let mut archive = minimal_archive();
        archive["timeline"][0]["startAt"] = json!(5000);
        archive["journey"]["endedAt"] = json!(10);
        assert!(validate_archive(&archive).is_valid);
    }
}
