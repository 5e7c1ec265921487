//! # Core Type Definitions
//!
//! This module contains all core types for the Rollbook attendance engine:
//! - Identifiers (`StudentId`, `ClassId`, `ActorId`, `RecordId`)
//! - Callers (`Role`, `Actor`)
//! - Records (`AttendanceStatus`, `NaturalKey`, `AttendanceRecord`, `NewRecord`)
//! - Class/date state (`SubmissionState`)
//! - Error types (`RollbookError`)
//!
//! ## Ordering Guarantees
//!
//! Every key type implements `Ord` so that stores and snapshots can use
//! `BTreeMap`/`BTreeSet` and iterate in a stable order.

use crate::primitives::{MAX_ID_LENGTH, MAX_REMARK_LENGTH};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Reject blank, oversized or control-character identifiers.
            pub fn validate(&self) -> Result<(), RollbookError> {
                if self.0.trim().is_empty() {
                    return Err(RollbookError::ValidationFailed(format!(
                        "{} must not be empty",
                        $what
                    )));
                }
                if self.0.chars().any(char::is_control) {
                    return Err(RollbookError::ValidationFailed(format!(
                        "{} must not contain control characters",
                        $what
                    )));
                }
                if self.0.len() > MAX_ID_LENGTH {
                    return Err(RollbookError::ValidationFailed(format!(
                        "{} exceeds {} bytes",
                        $what, MAX_ID_LENGTH
                    )));
                }
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// Identifier of an enrolled student (foreign reference owned by the roster).
    StudentId,
    "student id"
);

string_id!(
    /// Identifier of a class (foreign reference owned by the roster).
    ClassId,
    "class id"
);

string_id!(
    /// Identifier of the person performing an operation.
    ActorId,
    "actor id"
);

/// Opaque identifier assigned to a record by the store on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// Role of a caller. Closed set; permission rules match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Accounts,
    Teacher,
    Student,
    Parent,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Admin,
        Self::Accounts,
        Self::Teacher,
        Self::Student,
        Self::Parent,
    ];

    /// Admin and accounts staff may act on any class and any date.
    #[must_use]
    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::Admin | Self::Accounts)
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Accounts => "accounts",
            Self::Teacher => "teacher",
            Self::Student => "student",
            Self::Parent => "parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RollbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RollbookError::ValidationFailed(format!("Unknown role: {}", s)))
    }
}

/// The identity and role performing an operation.
///
/// The core never authenticates; it only authorizes the actor it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    /// Create a new actor.
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: ActorId::new(id),
            role,
        }
    }

    /// Shorthand for an admin actor.
    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    /// Shorthand for a teacher actor.
    #[must_use]
    pub fn teacher(id: impl Into<String>) -> Self {
        Self::new(id, Role::Teacher)
    }
}

// =============================================================================
// ATTENDANCE STATUS
// =============================================================================

/// Daily attendance status of one student in one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(alias = "present")]
    Present,
    #[serde(alias = "late")]
    Late,
    #[serde(alias = "absent")]
    Absent,
}

impl AttendanceStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 3] = [Self::Present, Self::Late, Self::Absent];

    /// Present and late both count as attended.
    #[must_use]
    pub const fn is_attended(self) -> bool {
        matches!(self, Self::Present | Self::Late)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Late => "Late",
            Self::Absent => "Absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = RollbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                RollbookError::ValidationFailed(format!("Unknown attendance status: {}", s))
            })
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// The `(student, class, date)` triple. At most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub student: StudentId,
    pub class: ClassId,
    pub date: NaiveDate,
}

impl NaturalKey {
    #[must_use]
    pub fn new(student: StudentId, class: ClassId, date: NaiveDate) -> Self {
        Self {
            student,
            class,
            date,
        }
    }

    /// Reject keys with blank or oversized identifiers.
    pub fn validate(&self) -> Result<(), RollbookError> {
        self.student.validate()?;
        self.class.validate()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.student, self.class, self.date)
    }
}

/// A per-student, per-class, per-date status entry with audit fields.
///
/// `taken_by` is fixed at creation. `edited_by`/`edited_at` are only set when a
/// later call mutates the record. `version` starts at 1 and increases on every
/// stored mutation; stores use it to detect lost updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub student: StudentId,
    pub class: ClassId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remark: Option<String>,
    pub taken_by: ActorId,
    pub edited_by: Option<ActorId>,
    pub edited_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl AttendanceRecord {
    /// The natural key of this record.
    #[must_use]
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.student.clone(), self.class.clone(), self.date)
    }

    /// Whether a later call has mutated this record.
    #[must_use]
    pub fn is_edited(&self) -> bool {
        self.edited_by.is_some()
    }
}

/// A record that has not been stored yet. The store assigns its id and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub key: NaturalKey,
    pub status: AttendanceStatus,
    pub remark: Option<String>,
    pub taken_by: ActorId,
}

impl NewRecord {
    /// Materialize with the id chosen by the store.
    #[must_use]
    pub fn into_record(self, id: RecordId) -> AttendanceRecord {
        AttendanceRecord {
            id,
            student: self.key.student,
            class: self.key.class,
            date: self.key.date,
            status: self.status,
            remark: self.remark,
            taken_by: self.taken_by,
            edited_by: None,
            edited_at: None,
            version: 1,
        }
    }
}

/// Normalize a free-text remark: trimmed, blank becomes `None`, bounded length.
pub fn normalize_remark(remark: Option<&str>) -> Result<Option<String>, RollbookError> {
    let Some(text) = remark.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.len() > MAX_REMARK_LENGTH {
        return Err(RollbookError::ValidationFailed(format!(
            "Remark length {} exceeds maximum {} bytes",
            text.len(),
            MAX_REMARK_LENGTH
        )));
    }
    Ok(Some(text.to_string()))
}

// =============================================================================
// SUBMISSION STATE
// =============================================================================

/// Explicit submission state of a `(class, date)` pair.
///
/// `Open -> Submitted` on submission; only elevated roles move it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SubmissionState {
    #[default]
    Open,
    Submitted { by: ActorId, at: DateTime<Utc> },
}

impl SubmissionState {
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Rollbook system.
///
/// - Every failure is returned to the caller; nothing is retried
/// - The CORE should never panic; all errors are recoverable
#[derive(Debug, Error)]
pub enum RollbookError {
    /// The actor's role or ownership does not allow the action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The actor may not touch this date (non-today for a teacher).
    #[error("Attendance can only be taken for the current day")]
    DateConstraintViolated { date: NaiveDate, today: NaiveDate },

    /// Malformed input.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The roster provider does not know the class.
    #[error("Class not found: {0}")]
    ClassNotFound(ClassId),

    /// No record with this id.
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// A second record was offered for an existing natural key.
    #[error("Duplicate attendance record for {0}")]
    DuplicateKey(NaturalKey),

    /// The stored record changed since it was read.
    #[error("Record {id} was modified concurrently (expected version {expected}, found {found})")]
    ConcurrentModification {
        id: RecordId,
        expected: u64,
        found: u64,
    },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl RollbookError {
    /// Stable snake_case code for the error category.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::DateConstraintViolated { .. } => "date_constraint_violated",
            Self::ValidationFailed(_) => "validation_failed",
            Self::ClassNotFound(_) => "class_not_found",
            Self::RecordNotFound(_) => "record_not_found",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::SerializationError(_) => "serialization_error",
            Self::DeserializationError(_) => "deserialization_error",
            Self::IoError(_) => "io_error",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
