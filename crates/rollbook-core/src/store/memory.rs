//! In-memory attendance store.

use super::{
    AttendanceStore, Snapshot, SubmissionEntry, check_batch_keys, check_update, id_after,
    reserve_ids,
};
use crate::{
    AttendanceRecord, ClassId, NaturalKey, NewRecord, RecordId, RollbookError, SubmissionState,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// BTreeMap-backed store.
///
/// `Clone` yields an independent snapshot of the whole collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Record storage: RecordId -> AttendanceRecord
    records: BTreeMap<RecordId, AttendanceRecord>,

    /// Natural key index: (student, class, date) -> RecordId
    key_index: BTreeMap<NaturalKey, RecordId>,

    /// Non-open submission states
    submissions: BTreeMap<(ClassId, NaiveDate), SubmissionState>,

    /// Next available RecordId
    next_record_id: u64,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot, re-checking key uniqueness.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, RollbookError> {
        let mut store = Self::new();
        for record in snapshot.records {
            record.key().validate()?;
            if store.key_index.contains_key(&record.key()) {
                return Err(RollbookError::DuplicateKey(record.key()));
            }
            if store.records.contains_key(&record.id) {
                return Err(RollbookError::DeserializationError(format!(
                    "duplicate record id {}",
                    record.id
                )));
            }
            store.next_record_id = store.next_record_id.max(id_after(record.id)?);
            store.key_index.insert(record.key(), record.id);
            store.records.insert(record.id, record);
        }
        for entry in snapshot.submissions {
            if entry.state.is_submitted() {
                store.submissions.insert((entry.class, entry.date), entry.state);
            }
        }
        Ok(store)
    }

    /// Store already-checked records under freshly reserved ids.
    fn allocate(
        &mut self,
        records: Vec<NewRecord>,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        let ids = reserve_ids(self.next_record_id, records.len())?;
        self.next_record_id = ids.end;
        Ok(ids
            .zip(records)
            .map(|(id, record)| {
                let stored = record.into_record(RecordId(id));
                self.key_index.insert(stored.key(), stored.id);
                self.records.insert(stored.id, stored.clone());
                stored
            })
            .collect())
    }
}

impl AttendanceStore for MemoryStore {
    fn get(&self, key: &NaturalKey) -> Result<Option<AttendanceRecord>, RollbookError> {
        Ok(self
            .key_index
            .get(key)
            .and_then(|id| self.records.get(id))
            .cloned())
    }

    fn get_by_id(&self, id: RecordId) -> Result<Option<AttendanceRecord>, RollbookError> {
        Ok(self.records.get(&id).cloned())
    }

    fn insert(&mut self, record: NewRecord) -> Result<AttendanceRecord, RollbookError> {
        if self.key_index.contains_key(&record.key) {
            return Err(RollbookError::DuplicateKey(record.key));
        }
        self.allocate(vec![record])?
            .pop()
            .ok_or_else(|| RollbookError::IoError("insert stored no record".to_string()))
    }

    fn insert_batch(
        &mut self,
        records: Vec<NewRecord>,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        check_batch_keys(&records, |key| Ok(self.key_index.contains_key(key)))?;
        self.allocate(records)
    }

    fn update(&mut self, record: AttendanceRecord) -> Result<AttendanceRecord, RollbookError> {
        let stored = self
            .records
            .get(&record.id)
            .ok_or(RollbookError::RecordNotFound(record.id))?;
        check_update(stored, &record)?;

        let updated = AttendanceRecord {
            version: record.version.saturating_add(1),
            ..record
        };
        self.records.insert(updated.id, updated.clone());
        Ok(updated)
    }

    fn records(&self) -> Result<Vec<AttendanceRecord>, RollbookError> {
        Ok(self.records.values().cloned().collect())
    }

    fn records_for(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        let mut records: Vec<_> = self
            .key_index
            .iter()
            .filter(|(key, _)| &key.class == class && key.date == date)
            .filter_map(|(_, id)| self.records.get(id).cloned())
            .collect();
        records.sort_by(|a, b| a.student.cmp(&b.student));
        Ok(records)
    }

    fn record_count(&self) -> Result<usize, RollbookError> {
        Ok(self.records.len())
    }

    fn submission(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionState, RollbookError> {
        Ok(self
            .submissions
            .get(&(class.clone(), date))
            .cloned()
            .unwrap_or_default())
    }

    fn set_submission(
        &mut self,
        class: &ClassId,
        date: NaiveDate,
        state: SubmissionState,
    ) -> Result<(), RollbookError> {
        let key = (class.clone(), date);
        if state.is_submitted() {
            self.submissions.insert(key, state);
        } else {
            self.submissions.remove(&key);
        }
        Ok(())
    }

    fn submissions(&self) -> Result<Vec<SubmissionEntry>, RollbookError> {
        Ok(self
            .submissions
            .iter()
            .map(|((class, date), state)| SubmissionEntry {
                class: class.clone(),
                date: *date,
                state: state.clone(),
            })
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
