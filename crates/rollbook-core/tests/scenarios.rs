//! # Attendance Scenarios
//!
//! End-to-end flows through `Register`, one module per concern.
//!
//! Fixture: class C1 (teacher T, students S1..S8), class C2 (teacher U, S9).

use chrono::NaiveDate;
use rollbook_core::{
    Actor, ActorId, AttendanceStatus, ClassEntry, ClassId, FixedClock, Filter, MarkChange,
    MarkRequest, RecordFilter, Register, RollbookError, RosterDirectory, Student, StudentId,
    SubmissionState,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 12).expect("date")
}

fn yesterday() -> NaiveDate {
    today().pred_opt().expect("date")
}

fn directory() -> RosterDirectory {
    let mut dir = RosterDirectory::new();
    for (id, teacher) in [("C1", "T"), ("C2", "U")] {
        dir.add_class(ClassEntry {
            id: ClassId::new(id),
            name: String::new(),
            teacher_id: ActorId::new(teacher),
        })
        .expect("class");
    }
    for n in 1..=8 {
        dir.enroll(Student {
            id: StudentId::new(format!("S{}", n)),
            name: format!("Student {}", n),
            class_id: ClassId::new("C1"),
        })
        .expect("enroll");
    }
    dir.enroll(Student {
        id: StudentId::new("S9"),
        name: "Student 9".to_string(),
        class_id: ClassId::new("C2"),
    })
    .expect("enroll");
    dir
}

fn register_on(day: NaiveDate) -> Register {
    Register::new(directory()).with_clock(FixedClock::new(day))
}

fn mark(student: &str, class: &str, date: NaiveDate, status: AttendanceStatus) -> MarkRequest {
    MarkRequest::new(student, class, date, status)
}

fn c1() -> ClassId {
    ClassId::new("C1")
}

// =============================================================================
// MARKING
// =============================================================================

mod marking {
    use super::*;

    /// Teacher marks own student for today.
    #[test]
    fn teacher_marks_present_today() {
        let mut register = register_on(today());
        let s1 = StudentId::new("S1");
        assert_eq!(register.attendance_status(&s1, today()).expect("status"), None);

        let outcome = register
            .mark_attendance(
                &Actor::teacher("T"),
                mark("S1", "C1", today(), AttendanceStatus::Present),
            )
            .expect("mark");

        assert_eq!(outcome.record.taken_by, ActorId::new("T"));
        assert_eq!(
            register.attendance_status(&s1, today()).expect("status"),
            Some(AttendanceStatus::Present)
        );
    }

    /// Teacher cannot mark a past date; nothing is created.
    #[test]
    fn teacher_cannot_mark_yesterday() {
        let mut register = register_on(today());
        let err = register.mark_attendance(
            &Actor::teacher("T"),
            mark("S1", "C1", yesterday(), AttendanceStatus::Present),
        );
        assert!(matches!(
            err,
            Err(RollbookError::DateConstraintViolated { .. })
        ));
        assert_eq!(register.record_count().expect("count"), 0);
    }

    /// Teacher of another class is refused.
    #[test]
    fn other_teacher_is_denied() {
        let mut register = register_on(today());
        let err = register.mark_attendance(
            &Actor::teacher("U"),
            mark("S1", "C1", today(), AttendanceStatus::Present),
        );
        assert!(matches!(err, Err(RollbookError::PermissionDenied(_))));
        assert_eq!(register.record_count().expect("count"), 0);
    }

    /// Admin edits a teacher's record on a later day; audit fields follow.
    #[test]
    fn admin_edit_keeps_taken_by() {
        let mut register = register_on(today());
        register
            .mark_attendance(
                &Actor::teacher("T"),
                mark("S1", "C1", today(), AttendanceStatus::Present),
            )
            .expect("mark");

        let later = today().succ_opt().expect("date");
        let snapshot = register.snapshot().expect("snapshot");
        let mut register = register_on(later);
        register.import(snapshot).expect("import");

        let outcome = register
            .mark_attendance(
                &Actor::admin("A"),
                mark("S1", "C1", today(), AttendanceStatus::Late).with_remark("traffic"),
            )
            .expect("edit");

        assert_eq!(outcome.change, MarkChange::Updated);
        assert_eq!(outcome.record.status, AttendanceStatus::Late);
        assert_eq!(outcome.record.edited_by, Some(ActorId::new("A")));
        assert!(outcome.record.edited_at.is_some());
        assert_eq!(outcome.record.taken_by, ActorId::new("T"));
    }

    /// A teacher may not overwrite a record the admin created.
    #[test]
    fn teacher_cannot_overwrite_admin_record() {
        let mut register = register_on(today());
        register
            .mark_attendance(
                &Actor::admin("A"),
                mark("S2", "C1", today(), AttendanceStatus::Absent),
            )
            .expect("mark");

        let err = register.mark_attendance(
            &Actor::teacher("T"),
            mark("S2", "C1", today(), AttendanceStatus::Present),
        );
        assert!(matches!(err, Err(RollbookError::PermissionDenied(_))));
    }
}

// =============================================================================
// SUBMISSION
// =============================================================================

mod submission {
    use super::*;
    use rollbook_core::primitives::DEFAULT_SUBMISSION_REMARK;

    fn mark_first_five(register: &mut Register) {
        for n in 1..=5 {
            register
                .mark_attendance(
                    &Actor::teacher("T"),
                    mark(&format!("S{}", n), "C1", today(), AttendanceStatus::Present),
                )
                .expect("mark");
        }
    }

    /// 8 students, 5 marked; admin submit fills the other 3 as absent.
    #[test]
    fn admin_submit_completes_roster() {
        let mut register = register_on(today());
        mark_first_five(&mut register);

        let report = register
            .submit_attendance(&Actor::admin("A"), &c1(), today())
            .expect("submit");
        assert_eq!(report.completed.len(), 3);
        assert_eq!(report.already_marked, 5);

        let records = register
            .filtered_records(&RecordFilter::new(Filter::parse("C1"), Filter::parse("all")))
            .expect("records");
        assert_eq!(records.len(), 8);
        let defaulted: Vec<_> = records
            .iter()
            .filter(|r| r.remark.as_deref() == Some(DEFAULT_SUBMISSION_REMARK))
            .map(|r| r.student.as_str())
            .collect();
        assert_eq!(defaulted, vec!["S6", "S7", "S8"]);
        assert!(register.roster_complete(&c1(), today()).expect("complete"));
    }

    /// A second submit changes nothing and keeps present students present.
    #[test]
    fn resubmit_is_a_no_op() {
        let mut register = register_on(today());
        mark_first_five(&mut register);
        let admin = Actor::admin("A");

        register.submit_attendance(&admin, &c1(), today()).expect("submit");
        let first = register.snapshot().expect("snapshot");
        let again = register.submit_attendance(&admin, &c1(), today()).expect("again");

        assert!(again.completed.is_empty());
        assert_eq!(register.snapshot().expect("snapshot"), first);
        assert_eq!(
            register
                .attendance_status(&StudentId::new("S1"), today())
                .expect("status"),
            Some(AttendanceStatus::Present)
        );
    }

    /// Teacher submitting yesterday fails and leaves no trace.
    #[test]
    fn teacher_submit_for_past_date_is_rejected() {
        let mut register = register_on(today());
        let err = register.submit_attendance(&Actor::teacher("T"), &c1(), yesterday());
        assert!(matches!(
            err,
            Err(RollbookError::DateConstraintViolated { .. })
        ));
        assert_eq!(register.record_count().expect("count"), 0);
        assert_eq!(
            register.submission_state(&c1(), yesterday()).expect("state"),
            SubmissionState::Open
        );
    }

    /// Submitted class/date locks the teacher out until an admin unlocks it.
    #[test]
    fn lock_and_unlock() {
        let mut register = register_on(today());
        let teacher = Actor::teacher("T");
        register.submit_attendance(&teacher, &c1(), today()).expect("submit");

        let err = register.mark_attendance(&teacher, mark("S1", "C1", today(), AttendanceStatus::Present));
        assert!(matches!(err, Err(RollbookError::PermissionDenied(_))));

        assert!(matches!(
            register.unlock_submission(&teacher, &c1(), today()),
            Err(RollbookError::PermissionDenied(_))
        ));
        register
            .unlock_submission(&Actor::admin("A"), &c1(), today())
            .expect("unlock");

        register
            .mark_attendance(&teacher, mark("S1", "C1", today(), AttendanceStatus::Present))
            .expect("re-take after unlock");
    }

    /// Roster growth after submission shows in the derived condition only.
    #[test]
    fn roster_change_after_submission() {
        let mut register = register_on(today());
        let admin = Actor::admin("A");
        register.submit_attendance(&admin, &c1(), today()).expect("submit");

        register
            .roster_mut()
            .enroll(Student {
                id: StudentId::new("S10"),
                name: "New Arrival".to_string(),
                class_id: c1(),
            })
            .expect("enroll");

        assert!(!register.roster_complete(&c1(), today()).expect("complete"));
        assert!(
            register
                .submission_state(&c1(), today())
                .expect("state")
                .is_submitted()
        );

        let report = register.submit_attendance(&admin, &c1(), today()).expect("resubmit");
        assert_eq!(report.completed, vec![StudentId::new("S10")]);
        assert!(register.roster_complete(&c1(), today()).expect("complete"));
    }
}

// =============================================================================
// QUERIES
// =============================================================================

mod queries {
    use super::*;

    /// History spans classes and dates, newest first.
    #[test]
    fn history_is_sorted_by_date_descending() {
        let mut register = register_on(today());
        let admin = Actor::admin("A");
        for date in [yesterday(), today(), yesterday().pred_opt().expect("date")] {
            register
                .mark_attendance(&admin, mark("S3", "C1", date, AttendanceStatus::Late))
                .expect("mark");
        }
        let dates: Vec<_> = register
            .student_history(&StudentId::new("S3"))
            .expect("history")
            .into_iter()
            .map(|r| r.date)
            .collect();
        let mut expected = dates.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, expected);
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn summary_over_class_day() {
        let mut register = register_on(today());
        let teacher = Actor::teacher("T");
        register
            .mark_attendance(&teacher, mark("S1", "C1", today(), AttendanceStatus::Present))
            .expect("mark");
        register
            .mark_attendance(&teacher, mark("S2", "C1", today(), AttendanceStatus::Late))
            .expect("mark");
        register.submit_attendance(&teacher, &c1(), today()).expect("submit");

        let summary = register
            .summary(&RecordFilter::new(Filter::Only(c1()), Filter::All).on(today()))
            .expect("summary");
        assert_eq!(summary.total, 8);
        assert_eq!(summary.present, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 6);
        assert_eq!(summary.attendance_rate_percent, 25);
    }
}
