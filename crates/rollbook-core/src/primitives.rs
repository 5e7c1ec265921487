//! # Fixed Primitives
//!
//! Hardcoded runtime constants for the Rollbook CORE.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Remark stamped on every record created by the submission fill loop.
pub const DEFAULT_SUBMISSION_REMARK: &str = "Marked absent by default on submission";

/// Sentinel accepted by class/student filters meaning "no filter".
pub const ALL_FILTER: &str = "all";

/// Magic bytes for the Rollbook snapshot format header.
///
/// - File Header = Magic Bytes ("RLBK") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"RLBK";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for student, class and actor identifiers.
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length for a free-text remark.
pub const MAX_REMARK_LENGTH: usize = 500;

/// Maximum number of entries in a single bulk mark.
///
/// Larger batches are rejected before any record is touched.
pub const MAX_BATCH_SIZE: usize = 5000;

/// Maximum length of a roster search term.
pub const MAX_SEARCH_TERM_LENGTH: usize = 256;
