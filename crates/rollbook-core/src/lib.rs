//! # rollbook-core
//!
//! The attendance engine for Rollbook - THE LOGIC.
//!
//! Role-gated marking of per-student daily attendance, an audit trail for
//! edits, and a submission step that reconciles a full class roster.
//!
//! ## Components (leaves first)
//!
//! - `permission`: pure decisions over `(actor, class, date, today)`
//! - `store`: the record repository (natural-key uniqueness, versioned updates)
//! - `marking`: creates or mutates a single record
//! - `submission`: fills unmarked roster members and closes a class/date
//! - `query`: read-only views for display
//! - `register`: the service object wiring the above to a roster, clock and sink
//!
//! ## Architectural Constraints
//!
//! - Synchronous: every call runs to completion, nothing is scheduled
//! - NO async, NO network dependencies, NO logging dependency
//! - Clock, roster and actor are always injected, never ambient

// =============================================================================
// MODULES
// =============================================================================

pub mod clock;
pub mod formats;
pub mod marking;
pub mod notification;
pub mod permission;
pub mod primitives;
pub mod query;
pub mod register;
pub mod roster;
pub mod store;
pub mod submission;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Actor, ActorId, AttendanceRecord, AttendanceStatus, ClassId, NaturalKey, NewRecord, RecordId,
    Role, RollbookError, StudentId, SubmissionState, normalize_remark,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use marking::{MarkChange, MarkEntry, MarkOutcome, MarkRequest, MarkingEngine};
pub use notification::{
    CollectingSink, Notification, NotificationLevel, NotificationSink,
};
pub use permission::{Decision, Denial};
pub use query::{AttendanceSummary, Filter, RecordFilter, StudentFilter, TeacherScope};
pub use register::{Register, StorageBackend};
pub use roster::{ClassEntry, ClassRoster, RosterDirectory, RosterFile, RosterProvider, Student};
pub use store::{AttendanceStore, MemoryStore, RedbStore, Snapshot, SubmissionEntry};
pub use submission::{SubmissionCoordinator, SubmissionReport};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};
