//! # Attendance Record Repository
//!
//! The `AttendanceStore` trait is the only contract the engine needs from
//! persistence. Every backend must:
//! - keep at most one record per `(student, class, date)` natural key
//! - never delete records
//! - apply each call atomically (no partial writes visible to readers)
//! - reject stale updates via the record `version`
//!
//! Backends:
//! - `MemoryStore`: BTreeMap-backed, volatile unless exported
//! - `RedbStore`: disk-backed, one ACID transaction per call

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::{
    AttendanceRecord, ClassId, NaturalKey, NewRecord, RecordId, RollbookError, SubmissionState,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

// =============================================================================
// ATTENDANCESTORE TRAIT
// =============================================================================

/// Storage contract for attendance records and class/date submission state.
///
/// All operations return `Result<T, RollbookError>` so that in-memory and
/// persistent backends are used uniformly.
pub trait AttendanceStore {
    /// Lookup a record by natural key.
    fn get(&self, key: &NaturalKey) -> Result<Option<AttendanceRecord>, RollbookError>;

    /// Lookup a record by id.
    fn get_by_id(&self, id: RecordId) -> Result<Option<AttendanceRecord>, RollbookError>;

    /// Store a new record and assign its id.
    /// Fails with `DuplicateKey` if the natural key is taken.
    fn insert(&mut self, record: NewRecord) -> Result<AttendanceRecord, RollbookError>;

    /// Store several new records at once. Either all are stored or none.
    fn insert_batch(
        &mut self,
        records: Vec<NewRecord>,
    ) -> Result<Vec<AttendanceRecord>, RollbookError>;

    /// Replace a stored record.
    ///
    /// `record.version` must equal the stored version, otherwise the call
    /// fails with `ConcurrentModification`. The stored copy gets `version + 1`
    /// and is returned.
    fn update(&mut self, record: AttendanceRecord) -> Result<AttendanceRecord, RollbookError>;

    /// All records ordered by id.
    fn records(&self) -> Result<Vec<AttendanceRecord>, RollbookError>;

    /// Records of one class on one date, ordered by student.
    fn records_for(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        let mut records: Vec<_> = self
            .records()?
            .into_iter()
            .filter(|r| &r.class == class && r.date == date)
            .collect();
        records.sort_by(|a, b| a.student.cmp(&b.student));
        Ok(records)
    }

    /// Number of stored records.
    fn record_count(&self) -> Result<usize, RollbookError>;

    /// Submission state of a class/date; `Open` if never submitted.
    fn submission(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionState, RollbookError>;

    /// Overwrite the submission state of a class/date.
    fn set_submission(
        &mut self,
        class: &ClassId,
        date: NaiveDate,
        state: SubmissionState,
    ) -> Result<(), RollbookError>;

    /// Every class/date that is not `Open`.
    fn submissions(&self) -> Result<Vec<SubmissionEntry>, RollbookError>;
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// One non-open submission state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEntry {
    pub class: ClassId,
    pub date: NaiveDate,
    pub state: SubmissionState,
}

/// Full store contents, used for export, import and the file backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<AttendanceRecord>,
    pub submissions: Vec<SubmissionEntry>,
}

impl Snapshot {
    /// Read everything out of any store.
    pub fn capture(store: &dyn AttendanceStore) -> Result<Self, RollbookError> {
        Ok(Self {
            records: store.records()?,
            submissions: store.submissions()?,
        })
    }
}

/// Reject a batch that repeats a natural key or collides with `existing`.
pub(crate) fn check_batch_keys(
    records: &[NewRecord],
    existing: impl Fn(&NaturalKey) -> Result<bool, RollbookError>,
) -> Result<(), RollbookError> {
    let mut seen = BTreeSet::new();
    for record in records {
        if !seen.insert(&record.key) || existing(&record.key)? {
            return Err(RollbookError::DuplicateKey(record.key.clone()));
        }
    }
    Ok(())
}

/// Reserve `count` ids starting at `next`.
///
/// The returned range's end becomes the new `next`; `u64::MAX` is never
/// handed out, so a record at that id can never be followed by a reuse.
pub(crate) fn reserve_ids(next: u64, count: usize) -> Result<Range<u64>, RollbookError> {
    u64::try_from(count)
        .ok()
        .and_then(|n| next.checked_add(n))
        .map(|end| next..end)
        .ok_or_else(|| RollbookError::ValidationFailed("record id space exhausted".to_string()))
}

/// Next free id after a record loaded from a snapshot.
pub(crate) fn id_after(id: RecordId) -> Result<u64, RollbookError> {
    id.0.checked_add(1).ok_or_else(|| {
        RollbookError::ValidationFailed(format!("record id {} is out of range", id))
    })
}

/// Check that an update targets the same natural key at the expected version.
pub(crate) fn check_update(
    stored: &AttendanceRecord,
    incoming: &AttendanceRecord,
) -> Result<(), RollbookError> {
    if stored.key() != incoming.key() {
        return Err(RollbookError::ValidationFailed(format!(
            "record {} cannot change its natural key",
            stored.id
        )));
    }
    if stored.taken_by != incoming.taken_by {
        return Err(RollbookError::ValidationFailed(format!(
            "record {} cannot change taken_by",
            stored.id
        )));
    }
    if stored.version != incoming.version {
        return Err(RollbookError::ConcurrentModification {
            id: stored.id,
            expected: incoming.version,
            found: stored.version,
        });
    }
    Ok(())
}

// =============================================================================
// TESTS (shared by both backends)
// =============================================================================
