use crate::support::{read_json_or_exit, to_pretty_json};
use chrono::{DateTime, Utc};
use momentbook_archive::{normalize_archive_at, validate_archive};
use std::fs;
use std::path::Path;

fn parse_now_or_exit(now: Option<String>) -> DateTime<Utc> {
    let Some(now) = now else {
        return Utc::now();
    };
    match DateTime::parse_from_rfc3339(&now) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(err) => {
            eprintln!("error: --now must be an RFC 3339 timestamp, got {now:?}: {err}");
            std::process::exit(2);
        }
    }
}

pub fn run(input: String, out: Option<String>, now: Option<String>, allow_invalid: bool) {
    let now = parse_now_or_exit(now);
    let raw = read_json_or_exit(Path::new(&input));

    let normalized = normalize_archive_at(&raw, now);
    if !normalized.defaulted.is_empty() {
        tracing::info!(
            input = %input,
            defaulted = ?normalized.defaulted,
            "substituted defaults while normalizing"
        );
    }

    let rendered = to_pretty_json(&normalized.archive);
    match &out {
        Some(out) => {
            if let Err(err) = fs::write(out, format!("{rendered}\n")) {
                eprintln!("error: failed to write {out}: {err}");
                std::process::exit(2);
            }
        }
        None => println!("{rendered}"),
    }

    let report = validate_archive(&normalized.archive);
    if report.is_valid {
        return;
    }
    eprintln!(
        "normalized archive failed validation ({} error(s)):",
        report.errors.len()
    );
    for err in &report.errors {
        eprintln!("  - {err}");
    }
    if !allow_invalid {
        std::process::exit(1);
    }
}
