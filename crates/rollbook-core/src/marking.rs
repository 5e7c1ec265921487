//! # Marking Engine
//!
//! Creates or mutates a single attendance record.
//!
//! Every call runs the same pipeline:
//! 1. Validate the request (ids, remark)
//! 2. Gate: class access, then date window (`permission::check_mark`)
//! 3. Refuse writes into a submitted class/date unless elevated
//! 4. Require the student to be enrolled in the class roster
//! 5. Create the record, or overwrite it if the actor may (`check_overwrite`)
//!
//! A failed step performs no mutation. Nothing is retried.

use crate::clock::Clock;
use crate::permission::{check_mark, check_not_locked, check_overwrite};
use crate::primitives::MAX_BATCH_SIZE;
use crate::roster::ClassRoster;
use crate::store::AttendanceStore;
use crate::{
    Actor, AttendanceRecord, AttendanceStatus, ClassId, NaturalKey, NewRecord, RollbookError,
    StudentId, normalize_remark,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A request to mark one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRequest {
    pub student: StudentId,
    pub class: ClassId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remark: Option<String>,
}

impl MarkRequest {
    #[must_use]
    pub fn new(
        student: impl Into<String>,
        class: impl Into<String>,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            student: StudentId::new(student),
            class: ClassId::new(class),
            date,
            status,
            remark: None,
        }
    }

    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    fn key(&self) -> NaturalKey {
        NaturalKey::new(self.student.clone(), self.class.clone(), self.date)
    }
}

/// One student's entry in a bulk mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkEntry {
    pub student: StudentId,
    pub status: AttendanceStatus,
    pub remark: Option<String>,
}

/// What a mark did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkChange {
    Created,
    Updated,
}

/// Result of a successful mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOutcome {
    pub record: AttendanceRecord,
    pub change: MarkChange,
}

/// A validated write, computed before touching the store.
enum Plan {
    Create(NewRecord),
    Overwrite(AttendanceRecord),
}

/// The MarkingEngine applies role-gated, audited marks.
pub struct MarkingEngine;

impl MarkingEngine {
    /// Mark one student for one class and date.
    pub fn mark(
        store: &mut dyn AttendanceStore,
        roster: &ClassRoster,
        clock: &dyn Clock,
        actor: &Actor,
        request: MarkRequest,
    ) -> Result<MarkOutcome, RollbookError> {
        Self::gate(&*store, roster, clock, actor, &request.class, request.date)?;
        let plan = Self::plan(&*store, roster, actor, clock.now(), &request)?;
        Self::execute(store, plan)
    }

    /// Mark several students of one class on one date under a single gate.
    ///
    /// Every entry is validated and permission-checked before the first
    /// write; new records are then stored in one batch.
    pub fn mark_many(
        store: &mut dyn AttendanceStore,
        roster: &ClassRoster,
        clock: &dyn Clock,
        actor: &Actor,
        date: NaiveDate,
        entries: Vec<MarkEntry>,
    ) -> Result<Vec<MarkOutcome>, RollbookError> {
        if entries.len() > MAX_BATCH_SIZE {
            return Err(RollbookError::ValidationFailed(format!(
                "Batch of {} entries exceeds maximum {}",
                entries.len(),
                MAX_BATCH_SIZE
            )));
        }
        let class = roster.class_id.clone();
        Self::gate(&*store, roster, clock, actor, &class, date)?;

        let now = clock.now();
        let mut seen = BTreeSet::new();
        let mut creates = Vec::new();
        let mut overwrites = Vec::new();
        for entry in entries {
            if !seen.insert(entry.student.clone()) {
                return Err(RollbookError::ValidationFailed(format!(
                    "student {} appears twice in one batch",
                    entry.student
                )));
            }
            let request = MarkRequest {
                student: entry.student,
                class: class.clone(),
                date,
                status: entry.status,
                remark: entry.remark,
            };
            match Self::plan(&*store, roster, actor, now, &request)? {
                Plan::Create(record) => creates.push(record),
                Plan::Overwrite(record) => overwrites.push(record),
            }
        }

        let mut outcomes: Vec<MarkOutcome> = store
            .insert_batch(creates)?
            .into_iter()
            .map(|record| MarkOutcome {
                record,
                change: MarkChange::Created,
            })
            .collect();
        for record in overwrites {
            outcomes.push(MarkOutcome {
                record: store.update(record)?,
                change: MarkChange::Updated,
            });
        }
        outcomes.sort_by(|a, b| a.record.student.cmp(&b.record.student));
        Ok(outcomes)
    }

    /// Records for roster members that have none yet, marked `status` by `actor`.
    ///
    /// Used by submission after its own gate has passed; no per-student
    /// permission check is repeated here.
    pub(crate) fn fill_missing(
        store: &dyn AttendanceStore,
        roster: &ClassRoster,
        actor: &Actor,
        date: NaiveDate,
        status: AttendanceStatus,
        remark: &str,
    ) -> Result<Vec<NewRecord>, RollbookError> {
        let marked: BTreeSet<StudentId> = store
            .records_for(&roster.class_id, date)?
            .into_iter()
            .map(|r| r.student)
            .collect();
        Ok(roster
            .students
            .iter()
            .filter(|student| !marked.contains(*student))
            .map(|student| NewRecord {
                key: NaturalKey::new(student.clone(), roster.class_id.clone(), date),
                status,
                remark: Some(remark.to_string()),
                taken_by: actor.id.clone(),
            })
            .collect())
    }

    /// Class-level checks shared by every write: access, date, lock.
    pub(crate) fn gate(
        store: &dyn AttendanceStore,
        roster: &ClassRoster,
        clock: &dyn Clock,
        actor: &Actor,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<(), RollbookError> {
        class.validate()?;
        if &roster.class_id != class {
            return Err(RollbookError::ValidationFailed(format!(
                "roster for class {} does not match class {}",
                roster.class_id, class
            )));
        }
        check_mark(actor, roster, date, clock.today()).into_result()?;
        let state = store.submission(class, date)?;
        check_not_locked(actor, &state, class, date).into_result()
    }

    /// Student-level checks and the resulting write.
    fn plan(
        store: &dyn AttendanceStore,
        roster: &ClassRoster,
        actor: &Actor,
        now: DateTime<Utc>,
        request: &MarkRequest,
    ) -> Result<Plan, RollbookError> {
        let key = request.key();
        key.validate()?;
        let remark = normalize_remark(request.remark.as_deref())?;
        if !roster.is_enrolled(&request.student) {
            return Err(RollbookError::ValidationFailed(format!(
                "student {} is not enrolled in class {}",
                request.student, request.class
            )));
        }

        match store.get(&key)? {
            None => Ok(Plan::Create(NewRecord {
                key,
                status: request.status,
                remark,
                taken_by: actor.id.clone(),
            })),
            Some(existing) => {
                check_overwrite(actor, &existing).into_result()?;
                Ok(Plan::Overwrite(AttendanceRecord {
                    status: request.status,
                    remark,
                    edited_by: Some(actor.id.clone()),
                    edited_at: Some(now),
                    ..existing
                }))
            }
        }
    }

    fn execute(store: &mut dyn AttendanceStore, plan: Plan) -> Result<MarkOutcome, RollbookError> {
        match plan {
            Plan::Create(record) => Ok(MarkOutcome {
                record: store.insert(record)?,
                change: MarkChange::Created,
            }),
            Plan::Overwrite(record) => Ok(MarkOutcome {
                record: store.update(record)?,
                change: MarkChange::Updated,
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
