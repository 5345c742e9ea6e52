//! Error types for journey archive operations.
//!
//! Data-quality problems never surface here; they are entries in a
//! [`ValidationReport`]. This enum covers the typed decode path only.

use crate::issue::ValidationReport;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The candidate failed validation; the report lists every reason.
    #[error("journey archive failed validation with {} error(s)", .report.errors.len())]
    Invalid { report: ValidationReport },

    /// The candidate validated but does not fit the typed model
    /// (e.g. fractional epoch milliseconds).
    #[error("journey archive decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ArchiveError {
    /// The validation errors, when this is a rejection.
    pub fn validation_errors(&self) -> &[String] {
        match self {
            Self::Invalid { report } => &report.errors,
            Self::Decode(_) => &[],
        }
    }
}
