//! Validate-then-decode into the typed model.
//!
//! The validator works on untyped JSON so it can explain everything wrong
//! with a document. Once it accepts, the candidate is safe to turn into an
//! owned [`JourneyArchive`].

use crate::error::ArchiveError;
use crate::model::JourneyArchive;
use crate::validate::validate_archive;
use serde::Deserialize;
use serde_json::Value;

pub fn decode_archive(candidate: &Value) -> Result<JourneyArchive, ArchiveError> {
    let report = validate_archive(candidate);
    if !report.is_valid {
        return Err(ArchiveError::Invalid { report });
    }
    let archive = JourneyArchive::deserialize(candidate)?;
    Ok(archive)
}
