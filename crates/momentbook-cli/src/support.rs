use serde_json::Value;
use std::fs;
use std::path::Path;

/// Read and parse one JSON document. The error is a one-line message
/// naming the file.
pub fn read_json(path: &Path) -> Result<Value, String> {
    let bytes = fs::read(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_slice::<Value>(&bytes)
        .map_err(|err| format!("failed to parse json {}: {err}", path.display()))
}

pub fn read_json_or_exit(path: &Path) -> Value {
    read_json(path).unwrap_or_else(|message| {
        eprintln!("error: {message}");
        std::process::exit(2);
    })
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
