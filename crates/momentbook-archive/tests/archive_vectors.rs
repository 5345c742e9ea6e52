//! Integration tests: run the archive fixture vectors.
//!
//! Each fixture in tests/fixtures/ has:
//! - input.json: an export as some producer emitted it
//! - expect.json: the verdict on the raw input, the verdict after
//!   normalization, and the paths the normalizer had to default
//!
//! Normalization runs against a fixed instant so defaulted export times
//! are reproducible.

use chrono::{DateTime, TimeZone, Utc};
use momentbook_archive::{decode_archive, normalize_archive_at, validate_archive};
use serde_json::{Value, json};
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
}

fn read_json(path: PathBuf) -> Value {
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn run_fixture(name: &str) {
    let dir = fixtures_dir().join(name);
    let input = read_json(dir.join("input.json"));
    let expected = read_json(dir.join("expect.json"));

    let normalized = normalize_archive_at(&input, fixed_now());
    let got = json!({
        "input": validate_archive(&input),
        "normalized": validate_archive(&normalized.archive),
        "defaulted": normalized.defaulted,
    });

    assert_eq!(
        got,
        expected,
        "\n\nFixture: {name}\n\nGot:\n{}\n\nExpected:\n{}\n",
        serde_json::to_string_pretty(&got).unwrap(),
        serde_json::to_string_pretty(&expected).unwrap(),
    );

    // Whatever the validator accepts must also decode.
    if expected["normalized"]["isValid"] == json!(true) {
        decode_archive(&normalized.archive)
            .unwrap_or_else(|e| panic!("fixture {name} validated but failed to decode: {e}"));
    }

    // Normalizing twice never changes the verdict.
    let again = normalize_archive_at(&normalized.archive, fixed_now());
    assert_eq!(
        validate_archive(&again.archive),
        validate_archive(&normalized.archive),
        "fixture {name}: renormalizing changed the verdict"
    );
}

#[test]
fn valid_v3_complete() {
    run_fixture("valid_v3_complete");
}

#[test]
fn legacy_v2_photo_group() {
    run_fixture("legacy_v2_photo_group");
}

#[test]
fn dangling_references() {
    run_fixture("dangling_references");
}

#[test]
fn not_an_object() {
    run_fixture("not_an_object");
}

#[test]
fn missing_collections() {
    run_fixture("missing_collections");
}
