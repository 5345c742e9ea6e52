//! Validation issues and the report handed back to callers.
//!
//! The external contract is the ordered list of human-readable lines in
//! [`ValidationReport::errors`]. [`ArchiveIssue`] carries the same line plus
//! the offending path and a coarse class, for callers that would rather not
//! pattern-match on prose.

use serde::{Deserialize, Serialize};

/// Coarse category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueClass {
    /// The document is not shaped enough to check further.
    Structure,
    /// Wrong type, missing required field, or value outside its enumeration.
    FieldContract,
    /// A photo reference that does not resolve, or a duplicate photo id.
    Reference,
    /// A counter disagrees with the collection it summarizes.
    Count,
}

impl IssueClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::FieldContract => "field_contract",
            Self::Reference => "reference",
            Self::Count => "count",
        }
    }
}

impl std::fmt::Display for IssueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveIssue {
    pub class: IssueClass,
    /// Dotted path with zero-based indices, e.g. `timeline[2].photoIds`.
    pub path: String,
    /// The full error line, path included.
    pub message: String,
}

impl ArchiveIssue {
    pub fn new(class: IssueClass, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ArchiveIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Verdict of one validator call. `is_valid` holds exactly when `errors`
/// is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_issues(issues: &[ArchiveIssue]) -> Self {
        let errors: Vec<String> = issues.iter().map(|issue| issue.message.clone()).collect();
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Whether any error line contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.errors.iter().any(|error| error.contains(needle))
    }
}
