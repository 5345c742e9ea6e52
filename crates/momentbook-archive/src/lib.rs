//! # Momentbook Journey Archive
//!
//! The normalization and validation engine for the journey archive
//! interchange document: one trip's metadata, its chronological timeline,
//! raw photo records, and an optional recap layer.
//!
//! Producers of the format drift over time. This crate turns whatever a
//! producer emitted into the canonical schema version 3 shape and then
//! judges that shape exhaustively.
//!
//! ## Architecture
//!
//! ```text
//! raw JSON ──► normalize ──► candidate v3 Value ──► validate ──► ValidationReport
//!                                                      │
//!                                                      └──► decode ──► JourneyArchive
//! ```
//!
//! - [`predicates`]: leaf checks and lossy coercions over `serde_json::Value`.
//! - [`normalize`]: never fails; substitutes defaults and leaves counts,
//!   uniqueness, and references for the validator.
//! - [`validate`]: independent of the normalizer; reports every violation
//!   in one pass, except the `timeline`/`photos` array prerequisite.
//!
//! Every entry point is a pure function of its input. There is no shared
//! state, so callers are free to fan documents out across threads.

pub mod decode;
pub mod error;
pub mod issue;
pub mod model;
pub mod normalize;
pub mod predicates;
pub mod validate;

pub use decode::decode_archive;
pub use error::ArchiveError;
pub use issue::{ArchiveIssue, IssueClass, ValidationReport};
pub use model::{
    ARCHIVE_FORMAT, DraftMode, JourneyArchive, OverrideOpType, PhotoIdSpace, RecapStage,
    SCHEMA_VERSION, TimelineItemType, WireEnum,
};
pub use normalize::{Normalized, normalize_archive, normalize_archive_at};
pub use validate::{collect_archive_issues, validate_archive};
