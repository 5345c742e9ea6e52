use crate::support::{read_json, to_pretty_json};
use momentbook_archive::{ValidationReport, normalize_archive, validate_archive};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// Files to check: plain paths as given, directories expanded to their
/// `*.json` entries. Sorted and deduplicated.
fn resolve_paths(inputs: &[String]) -> Vec<PathBuf> {
    let mut resolved = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if !path.is_dir() {
            resolved.push(path);
            continue;
        }
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to list directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                resolved.push(path);
            }
        }
    }
    resolved.sort();
    resolved.dedup();
    resolved
}

/// A file that never reached the validator fails with one error.
fn rejected(message: String) -> ValidationReport {
    ValidationReport {
        is_valid: false,
        errors: vec![message],
    }
}

fn check_file(path: &Path, normalize: bool) -> ValidationReport {
    let raw = match read_json(path) {
        Ok(raw) => raw,
        Err(message) => return rejected(message),
    };
    let report = if normalize {
        validate_archive(&normalize_archive(&raw))
    } else {
        validate_archive(&raw)
    };
    tracing::debug!(
        path = %path.display(),
        errors = report.errors.len(),
        "checked journey archive"
    );
    report
}

/// Check every file, striding the list across `jobs` workers. Reports
/// come back in the order of `files`.
fn check_all(files: &[PathBuf], normalize: bool, jobs: usize) -> Vec<ValidationReport> {
    let jobs = jobs.clamp(1, files.len().max(1));
    if jobs == 1 {
        return files.iter().map(|path| check_file(path, normalize)).collect();
    }

    let mut slots: Vec<Option<ValidationReport>> = vec![None; files.len()];
    thread::scope(|scope| {
        let workers: Vec<_> = (0..jobs)
            .map(|worker| {
                scope.spawn(move || {
                    files
                        .iter()
                        .enumerate()
                        .skip(worker)
                        .step_by(jobs)
                        .map(|(index, path)| (index, check_file(path, normalize)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for worker in workers {
            match worker.join() {
                Ok(reports) => {
                    for (index, report) in reports {
                        slots[index] = Some(report);
                    }
                }
                Err(_) => tracing::error!("validation worker panicked"),
            }
        }
    });

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| rejected("validation worker panicked".to_string()))
        })
        .collect()
}

pub fn run(paths: Vec<String>, normalize: bool, jobs: usize, json_output: bool) {
    let files = resolve_paths(&paths);

    if files.is_empty() {
        if json_output {
            println!(
                "{}",
                to_pretty_json(&json!({
                    "checked": 0,
                    "failed": 0,
                    "results": [],
                    "errors": ["no journey archives found"]
                }))
            );
        } else {
            println!("FAIL (no journey archives found)");
        }
        std::process::exit(1);
    }

    let reports = check_all(&files, normalize, jobs);
    let failed = reports.iter().filter(|report| !report.is_valid).count();

    if json_output {
        let results: Vec<_> = files
            .iter()
            .zip(&reports)
            .map(|(path, report)| {
                json!({
                    "path": path.display().to_string(),
                    "isValid": report.is_valid,
                    "errors": report.errors,
                })
            })
            .collect();
        println!(
            "{}",
            to_pretty_json(&json!({
                "checked": files.len(),
                "failed": failed,
                "results": results,
            }))
        );
    } else {
        for (path, report) in files.iter().zip(&reports) {
            if report.is_valid {
                println!("OK: {}", path.display());
            } else {
                println!("FAIL: {}", path.display());
                for err in &report.errors {
                    println!("  - {err}");
                }
            }
        }
        println!("checked={} failed={failed}", files.len());
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_checks_keep_input_order() {
        let files: Vec<PathBuf> = (0..7)
            .map(|index| PathBuf::from(format!("/nonexistent/momentbook-{index}.json")))
            .collect();
        let reports = check_all(&files, false, 3);
        assert_eq!(reports.len(), files.len());
        for (path, report) in files.iter().zip(&reports) {
            assert!(!report.is_valid);
            assert_eq!(report.errors.len(), 1);
            assert!(
                report.errors[0].contains(&path.display().to_string()),
                "report {:?} does not name {}",
                report.errors,
                path.display()
            );
        }
    }

    #[test]
    fn missing_file_is_kept_as_given() {
        let inputs = ["/nonexistent/b.json".to_string(), "/nonexistent/a.json".to_string()];
        assert_eq!(
            resolve_paths(&inputs),
            vec![
                PathBuf::from("/nonexistent/a.json"),
                PathBuf::from("/nonexistent/b.json")
            ]
        );
    }
}
