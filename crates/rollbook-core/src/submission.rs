//! # Submission Coordinator
//!
//! Reconciles a class roster against the records of one date and closes the
//! class/date.
//!
//! The gate (class access, then date window) is evaluated once for the whole
//! class. Missing roster members are then marked `Absent` with
//! `DEFAULT_SUBMISSION_REMARK` in a single batch, so either every missing
//! student gets a record or none does.
//!
//! Submission state is stored explicitly per class/date:
//!
//! ```text
//! Open --submit--> Submitted --unlock (admin/accounts)--> Open
//! ```
//!
//! Submitting again is allowed and only fills roster members added since.

use crate::clock::Clock;
use crate::marking::MarkingEngine;
use crate::permission::{check_mark, check_unlock};
use crate::primitives::DEFAULT_SUBMISSION_REMARK;
use crate::roster::ClassRoster;
use crate::store::AttendanceStore;
use crate::{Actor, AttendanceStatus, ClassId, RollbookError, StudentId, SubmissionState};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub class: ClassId,
    pub date: NaiveDate,
    /// Students marked absent by this call.
    pub completed: Vec<StudentId>,
    /// Roster members that already had a record.
    pub already_marked: usize,
    pub state: SubmissionState,
}

pub struct SubmissionCoordinator;

impl SubmissionCoordinator {
    /// Fill every unmarked roster member with an absent record and mark the
    /// class/date submitted.
    pub fn submit(
        store: &mut dyn AttendanceStore,
        roster: &ClassRoster,
        clock: &dyn Clock,
        actor: &Actor,
        date: NaiveDate,
    ) -> Result<SubmissionReport, RollbookError> {
        let class = roster.class_id.clone();
        class.validate()?;
        check_mark(actor, roster, date, clock.today()).into_result()?;

        let fill = MarkingEngine::fill_missing(
            &*store,
            roster,
            actor,
            date,
            AttendanceStatus::Absent,
            DEFAULT_SUBMISSION_REMARK,
        )?;
        let already_marked = roster.size().saturating_sub(fill.len());
        let completed = store
            .insert_batch(fill)?
            .into_iter()
            .map(|record| record.student)
            .collect();

        let state = match store.submission(&class, date)? {
            submitted @ SubmissionState::Submitted { .. } => submitted,
            SubmissionState::Open => {
                let state = SubmissionState::Submitted {
                    by: actor.id.clone(),
                    at: clock.now(),
                };
                store.set_submission(&class, date, state.clone())?;
                state
            }
        };

        Ok(SubmissionReport {
            class,
            date,
            completed,
            already_marked,
            state,
        })
    }

    /// Reopen a submitted class/date. Returns the state it had before.
    ///
    /// Unlocking an open class/date is a no-op.
    pub fn unlock(
        store: &mut dyn AttendanceStore,
        actor: &Actor,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionState, RollbookError> {
        class.validate()?;
        check_unlock(actor).into_result()?;
        let previous = store.submission(class, date)?;
        if previous.is_submitted() {
            store.set_submission(class, date, SubmissionState::Open)?;
        }
        Ok(previous)
    }

    /// The record-count condition: at least as many records for the
    /// class/date as the roster has members.
    ///
    /// Independent of the stored state; it changes when the roster does.
    pub fn roster_complete(
        store: &dyn AttendanceStore,
        roster: &ClassRoster,
        date: NaiveDate,
    ) -> Result<bool, RollbookError> {
        Ok(store.records_for(&roster.class_id, date)?.len() >= roster.size())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActorId;
    use crate::clock::FixedClock;
    use crate::marking::MarkRequest;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 16).expect("date")
    }

    fn roster(size: usize) -> ClassRoster {
        ClassRoster {
            class_id: ClassId::new("C1"),
            name: "Class 1".to_string(),
            teacher_id: ActorId::new("T"),
            students: (1..=size)
                .map(|n| StudentId::new(format!("S{}", n)))
                .collect::<BTreeSet<_>>(),
        }
    }

    fn mark(store: &mut MemoryStore, roster: &ClassRoster, student: &str) {
        MarkingEngine::mark(
            store,
            roster,
            &FixedClock::new(today()),
            &Actor::teacher("T"),
            MarkRequest::new(student, "C1", today(), AttendanceStatus::Present),
        )
        .expect("mark");
    }

    #[test]
    fn submit_fills_unmarked_students() {
        let roster = roster(4);
        let mut store = MemoryStore::new();
        mark(&mut store, &roster, "S1");
        mark(&mut store, &roster, "S3");

        let report = SubmissionCoordinator::submit(
            &mut store,
            &roster,
            &FixedClock::new(today()),
            &Actor::admin("A"),
            today(),
        )
        .expect("submit");

        assert_eq!(report.completed, vec![StudentId::new("S2"), StudentId::new("S4")]);
        assert_eq!(report.already_marked, 2);
        assert!(report.state.is_submitted());

        let filled = store
            .get(&crate::NaturalKey::new(
                StudentId::new("S2"),
                ClassId::new("C1"),
                today(),
            ))
            .expect("get")
            .expect("filled");
        assert_eq!(filled.status, AttendanceStatus::Absent);
        assert_eq!(filled.remark.as_deref(), Some(DEFAULT_SUBMISSION_REMARK));
        assert_eq!(filled.taken_by, ActorId::new("A"));
        assert!(SubmissionCoordinator::roster_complete(&store, &roster, today()).expect("complete"));
    }

    #[test]
    fn resubmit_keeps_first_state_and_fills_new_members() {
        let mut roster = roster(2);
        let mut store = MemoryStore::new();
        let clock = FixedClock::new(today());
        let teacher = Actor::teacher("T");
        let first =
            SubmissionCoordinator::submit(&mut store, &roster, &clock, &teacher, today())
                .expect("submit");

        let again = SubmissionCoordinator::submit(&mut store, &roster, &clock, &teacher, today())
            .expect("resubmit");
        assert!(again.completed.is_empty());
        assert_eq!(again.state, first.state);

        roster.students.insert(StudentId::new("S9"));
        assert!(!SubmissionCoordinator::roster_complete(&store, &roster, today()).expect("complete"));
        let late = SubmissionCoordinator::submit(&mut store, &roster, &clock, &teacher, today())
            .expect("late joiner");
        assert_eq!(late.completed, vec![StudentId::new("S9")]);
        assert_eq!(store.record_count().expect("count"), 3);
    }

    #[test]
    fn gate_failure_marks_nothing() {
        let roster = roster(3);
        let mut store = MemoryStore::new();
        let clock = FixedClock::new(today());
        let yesterday = today().pred_opt().expect("date");

        let err =
            SubmissionCoordinator::submit(&mut store, &roster, &clock, &Actor::teacher("T"), yesterday);
        assert!(matches!(
            err,
            Err(RollbookError::DateConstraintViolated { .. })
        ));
        let err =
            SubmissionCoordinator::submit(&mut store, &roster, &clock, &Actor::teacher("U"), today());
        assert!(matches!(err, Err(RollbookError::PermissionDenied(_))));

        assert_eq!(store.record_count().expect("count"), 0);
        assert_eq!(
            store.submission(&ClassId::new("C1"), today()).expect("state"),
            SubmissionState::Open
        );
    }

    #[test]
    fn only_elevated_roles_unlock() {
        let roster = roster(1);
        let mut store = MemoryStore::new();
        let clock = FixedClock::new(today());
        SubmissionCoordinator::submit(&mut store, &roster, &clock, &Actor::teacher("T"), today())
            .expect("submit");

        let err = SubmissionCoordinator::unlock(
            &mut store,
            &Actor::teacher("T"),
            &ClassId::new("C1"),
            today(),
        );
        assert!(matches!(err, Err(RollbookError::PermissionDenied(_))));

        let previous =
            SubmissionCoordinator::unlock(&mut store, &Actor::admin("A"), &ClassId::new("C1"), today())
                .expect("unlock");
        assert!(previous.is_submitted());
        assert_eq!(
            store.submission(&ClassId::new("C1"), today()).expect("state"),
            SubmissionState::Open
        );
    }
}
