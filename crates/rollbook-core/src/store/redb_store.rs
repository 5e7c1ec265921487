//! # redb-backed Attendance Storage
//!
//! A disk-backed store using the redb embedded database.
//!
//! Every trait call runs in its own redb transaction, so a call is either
//! fully committed or has no effect (batch inserts included). Record
//! payloads are postcard-encoded.
//!
//! ## Key layout
//!
//! Index keys are the postcard encoding of `(class, date, student)`. Each
//! string carries its own length prefix, so distinct triples never share a
//! key, and the encoding of `(class, date)` is a byte prefix shared by
//! exactly the records of that class/date.

use super::{
    AttendanceStore, Snapshot, SubmissionEntry, check_batch_keys, check_update, id_after,
    reserve_ids,
};
use crate::{
    AttendanceRecord, ClassId, NaturalKey, NewRecord, RecordId, RollbookError, SubmissionState,
};
use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for records: RecordId(u64) -> serialized AttendanceRecord bytes
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Table for the natural-key index: encoded key -> RecordId(u64)
const KEY_INDEX: TableDefinition<&[u8], u64> = TableDefinition::new("key_index");

/// Table for submission states: encoded class/date -> serialized SubmissionEntry
const SUBMISSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("submissions");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_RECORD_ID: &str = "next_record_id";

fn io(e: impl std::fmt::Display) -> RollbookError {
    RollbookError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RollbookError> {
    postcard::to_allocvec(value).map_err(|e| RollbookError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RollbookError> {
    postcard::from_bytes(bytes).map_err(|e| RollbookError::DeserializationError(e.to_string()))
}

/// Key of a class/date: the submission key and the index range prefix.
fn class_date_key(class: &ClassId, date: NaiveDate) -> Result<Vec<u8>, RollbookError> {
    encode(&(class, date))
}

fn encode_key(key: &NaturalKey) -> Result<Vec<u8>, RollbookError> {
    encode(&(&key.class, key.date, &key.student))
}

/// A disk-backed attendance store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Next available record ID.
    next_record_id: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_record_id", &self.next_record_id)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RollbookError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(RECORDS).map_err(io)?;
            let _ = write_txn.open_table(KEY_INDEX).map_err(io)?;
            let _ = write_txn.open_table(SUBMISSIONS).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        let next_record_id = {
            let read_txn = db.begin_read().map_err(io)?;
            let table = read_txn.open_table(METADATA).map_err(io)?;
            table
                .get(NEXT_RECORD_ID)
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        Ok(Self { db, next_record_id })
    }

    /// Load a snapshot into an empty store, keeping record ids.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> Result<(), RollbookError> {
        if self.record_count()? > 0 {
            return Err(RollbookError::ValidationFailed(
                "snapshot can only be loaded into an empty store".to_string(),
            ));
        }

        let write_txn = self.db.begin_write().map_err(io)?;
        let mut next_id = self.next_record_id;
        {
            let mut records_table = write_txn.open_table(RECORDS).map_err(io)?;
            let mut index_table = write_txn.open_table(KEY_INDEX).map_err(io)?;
            let mut submissions_table = write_txn.open_table(SUBMISSIONS).map_err(io)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(io)?;

            for record in &snapshot.records {
                record.key().validate()?;
                let key = encode_key(&record.key())?;
                if index_table.get(key.as_slice()).map_err(io)?.is_some() {
                    return Err(RollbookError::DuplicateKey(record.key()));
                }
                if records_table.get(record.id.0).map_err(io)?.is_some() {
                    return Err(RollbookError::DeserializationError(format!(
                        "duplicate record id {}",
                        record.id
                    )));
                }
                let bytes = encode(record)?;
                records_table
                    .insert(record.id.0, bytes.as_slice())
                    .map_err(io)?;
                index_table.insert(key.as_slice(), record.id.0).map_err(io)?;
                next_id = next_id.max(id_after(record.id)?);
            }

            for entry in snapshot.submissions.iter().filter(|e| e.state.is_submitted()) {
                let key = class_date_key(&entry.class, entry.date)?;
                let bytes = encode(entry)?;
                submissions_table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(io)?;
            }

            meta_table.insert(NEXT_RECORD_ID, next_id).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;

        self.next_record_id = next_id;
        Ok(())
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), RollbookError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }
}

impl AttendanceStore for RedbStore {
    fn get(&self, key: &NaturalKey) -> Result<Option<AttendanceRecord>, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let index_table = read_txn.open_table(KEY_INDEX).map_err(io)?;
        let Some(id) = index_table
            .get(encode_key(key)?.as_slice())
            .map_err(io)?
            .map(|v| v.value())
        else {
            return Ok(None);
        };
        let records_table = read_txn.open_table(RECORDS).map_err(io)?;
        let record = records_table.get(id).map_err(io)?;
        record.map(|data| decode(data.value())).transpose()
    }

    fn get_by_id(&self, id: RecordId) -> Result<Option<AttendanceRecord>, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let records_table = read_txn.open_table(RECORDS).map_err(io)?;
        let record = records_table.get(id.0).map_err(io)?;
        record.map(|data| decode(data.value())).transpose()
    }

    fn insert(&mut self, record: NewRecord) -> Result<AttendanceRecord, RollbookError> {
        self.insert_batch(vec![record])?
            .pop()
            .ok_or_else(|| RollbookError::IoError("insert stored no record".to_string()))
    }

    fn insert_batch(
        &mut self,
        records: Vec<NewRecord>,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids = reserve_ids(self.next_record_id, records.len())?;
        let write_txn = self.db.begin_write().map_err(io)?;
        let mut stored = Vec::with_capacity(records.len());
        {
            let mut records_table = write_txn.open_table(RECORDS).map_err(io)?;
            let mut index_table = write_txn.open_table(KEY_INDEX).map_err(io)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(io)?;

            // Validate every key before writing; an early return aborts the txn.
            check_batch_keys(&records, |key| {
                Ok(index_table
                    .get(encode_key(key)?.as_slice())
                    .map_err(io)?
                    .is_some())
            })?;

            for (id, record) in ids.clone().zip(records) {
                let record = record.into_record(RecordId(id));
                let bytes = encode(&record)?;
                records_table.insert(id, bytes.as_slice()).map_err(io)?;
                index_table
                    .insert(encode_key(&record.key())?.as_slice(), id)
                    .map_err(io)?;
                stored.push(record);
            }

            meta_table.insert(NEXT_RECORD_ID, ids.end).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;

        // Update in-memory state only after successful commit.
        self.next_record_id = ids.end;
        Ok(stored)
    }

    fn update(&mut self, record: AttendanceRecord) -> Result<AttendanceRecord, RollbookError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let updated = {
            let mut records_table = write_txn.open_table(RECORDS).map_err(io)?;
            let stored: AttendanceRecord = records_table
                .get(record.id.0)
                .map_err(io)?
                .map(|data| decode(data.value()))
                .transpose()?
                .ok_or(RollbookError::RecordNotFound(record.id))?;
            check_update(&stored, &record)?;

            let updated = AttendanceRecord {
                version: record.version.saturating_add(1),
                ..record
            };
            let bytes = encode(&updated)?;
            records_table
                .insert(updated.id.0, bytes.as_slice())
                .map_err(io)?;
            updated
        };
        write_txn.commit().map_err(io)?;
        Ok(updated)
    }

    fn records(&self) -> Result<Vec<AttendanceRecord>, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let records_table = read_txn.open_table(RECORDS).map_err(io)?;

        let mut records = Vec::new();
        for entry in records_table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn records_for(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let index_table = read_txn.open_table(KEY_INDEX).map_err(io)?;
        let records_table = read_txn.open_table(RECORDS).map_err(io)?;

        let prefix = class_date_key(class, date)?;
        let mut records = Vec::new();
        for entry in index_table.range(prefix.as_slice()..).map_err(io)? {
            let (key, id) = entry.map_err(io)?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if let Some(data) = records_table.get(id.value()).map_err(io)? {
                records.push(decode::<AttendanceRecord>(data.value())?);
            }
        }
        // Index order is by encoded length first; callers expect student order.
        records.sort_by(|a, b| a.student.cmp(&b.student));
        Ok(records)
    }

    fn record_count(&self) -> Result<usize, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let records_table = read_txn.open_table(RECORDS).map_err(io)?;
        let count = records_table.len().map_err(io)?;
        Ok(count as usize)
    }

    fn submission(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionState, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(SUBMISSIONS).map_err(io)?;
        let entry = table
            .get(class_date_key(class, date)?.as_slice())
            .map_err(io)?
            .map(|data| decode::<SubmissionEntry>(data.value()))
            .transpose()?;
        Ok(entry.map(|e| e.state).unwrap_or_default())
    }

    fn set_submission(
        &mut self,
        class: &ClassId,
        date: NaiveDate,
        state: SubmissionState,
    ) -> Result<(), RollbookError> {
        let key = class_date_key(class, date)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(SUBMISSIONS).map_err(io)?;
            if state.is_submitted() {
                let bytes = encode(&SubmissionEntry {
                    class: class.clone(),
                    date,
                    state,
                })?;
                table.insert(key.as_slice(), bytes.as_slice()).map_err(io)?;
            } else {
                table.remove(key.as_slice()).map_err(io)?;
            }
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn submissions(&self) -> Result<Vec<SubmissionEntry>, RollbookError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(SUBMISSIONS).map_err(io)?;

        let mut entries = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            entries.push(decode(value.value())?);
        }
        Ok(entries)
    }
}

// =============================================================================
// TESTS
// =============================================================================
