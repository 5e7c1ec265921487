//! # Register
//!
//! The attendance service object: one storage backend, the roster, an
//! injected clock and an optional notification sink. Every public operation
//! of the crate is reachable from here.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore` (fast, volatile unless exported)
//! - `Persistent`: `RedbStore` for disk-backed ACID storage

use crate::clock::{Clock, SystemClock};
use crate::marking::{MarkEntry, MarkOutcome, MarkRequest, MarkingEngine};
use crate::notification::{Notification, NotificationSink};
use crate::query::{
    self, AttendanceSummary, Filter, RecordFilter, StudentFilter, TeacherScope,
};
use crate::roster::{ClassRoster, RosterDirectory, RosterProvider, Student};
use crate::store::{AttendanceStore, MemoryStore, RedbStore, Snapshot};
use crate::submission::{SubmissionCoordinator, SubmissionReport};
use crate::{
    Actor, AttendanceRecord, AttendanceStatus, ClassId, RollbookError, StudentId, SubmissionState,
};
use chrono::NaiveDate;
use std::path::Path;

/// Storage backend for a Register.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn store(&self) -> &dyn AttendanceStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn AttendanceStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

/// Attendance service over a roster and a record store.
pub struct Register {
    backend: StorageBackend,
    roster: RosterDirectory,
    clock: Box<dyn Clock>,
    sink: Option<Box<dyn NotificationSink>>,
}

impl Register {
    /// In-memory register using the system clock.
    #[must_use]
    pub fn new(roster: RosterDirectory) -> Self {
        Self::with_store(MemoryStore::new(), roster)
    }

    /// Register over an existing in-memory store.
    #[must_use]
    pub fn with_store(store: MemoryStore, roster: RosterDirectory) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
            roster,
            clock: Box::new(SystemClock),
            sink: None,
        }
    }

    /// Register with persistent redb storage.
    ///
    /// Opens or creates a database at `path`; every change is committed
    /// before the call returns.
    pub fn with_redb(path: impl AsRef<Path>, roster: RosterDirectory) -> Result<Self, RollbookError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
            roster,
            clock: Box::new(SystemClock),
            sink: None,
        })
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Route outcome messages to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn roster(&self) -> &RosterDirectory {
        &self.roster
    }

    /// Mutable roster access for enrolment changes.
    pub fn roster_mut(&mut self) -> &mut RosterDirectory {
        &mut self.roster
    }

    /// Today according to the injected clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Mark one student. See [`MarkingEngine::mark`].
    pub fn mark_attendance(
        &mut self,
        actor: &Actor,
        request: MarkRequest,
    ) -> Result<MarkOutcome, RollbookError> {
        let result = self.class_roster(&request.class).and_then(|roster| {
            MarkingEngine::mark(
                self.backend.store_mut(),
                &roster,
                &*self.clock,
                actor,
                request,
            )
        });
        self.report(&result, |outcome| {
            vec![Notification::marked(
                outcome.record.status,
                &self.roster.student_name(&outcome.record.student),
            )]
        });
        result
    }

    /// Mark several students of one class on one date.
    pub fn mark_many(
        &mut self,
        actor: &Actor,
        class: &ClassId,
        date: NaiveDate,
        entries: Vec<MarkEntry>,
    ) -> Result<Vec<MarkOutcome>, RollbookError> {
        let result = self.class_roster(class).and_then(|roster| {
            MarkingEngine::mark_many(
                self.backend.store_mut(),
                &roster,
                &*self.clock,
                actor,
                date,
                entries,
            )
        });
        self.report(&result, |outcomes| {
            outcomes
                .iter()
                .map(|o| {
                    Notification::marked(
                        o.record.status,
                        &self.roster.student_name(&o.record.student),
                    )
                })
                .collect()
        });
        result
    }

    /// Fill unmarked roster members as absent and close the class/date.
    pub fn submit_attendance(
        &mut self,
        actor: &Actor,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionReport, RollbookError> {
        let result = self.class_roster(class).and_then(|roster| {
            SubmissionCoordinator::submit(self.backend.store_mut(), &roster, &*self.clock, actor, date)
        });
        self.report(&result, |report| {
            vec![Notification::submitted(
                &report.class,
                report.date,
                report.completed.len(),
            )]
        });
        result
    }

    /// Reopen a submitted class/date (admin/accounts only).
    pub fn unlock_submission(
        &mut self,
        actor: &Actor,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionState, RollbookError> {
        let result = self.class_roster(class).and_then(|roster| {
            SubmissionCoordinator::unlock(self.backend.store_mut(), actor, &roster.class_id, date)
        });
        self.report(&result, |_| vec![Notification::unlocked(class, date)]);
        result
    }

    /// Replace the whole store with a snapshot.
    ///
    /// In-memory stores are swapped wholesale; a redb store must be empty.
    pub fn import(&mut self, snapshot: Snapshot) -> Result<usize, RollbookError> {
        let count = snapshot.records.len();
        match &mut self.backend {
            StorageBackend::InMemory(store) => *store = MemoryStore::from_snapshot(snapshot)?,
            StorageBackend::Persistent(store) => store.load_snapshot(snapshot)?,
        }
        Ok(count)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Status of a student on a date in any class, `None` if unmarked.
    pub fn attendance_status(
        &self,
        student: &StudentId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceStatus>, RollbookError> {
        student.validate()?;
        Ok(query::attendance_status(&self.records()?, student, date))
    }

    /// Status of a student on a date, counting only classes `viewer` may see.
    pub fn visible_status(
        &self,
        viewer: &Actor,
        student: &StudentId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceStatus>, RollbookError> {
        student.validate()?;
        let filter = RecordFilter::new(Filter::All, Filter::Only(student.clone()))
            .on(date)
            .within(self.scope_for(viewer));
        Ok(query::attendance_status(
            &self.filtered_records(&filter)?,
            student,
            date,
        ))
    }

    /// Every record of a student, newest first.
    pub fn student_history(
        &self,
        student: &StudentId,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        student.validate()?;
        Ok(query::student_history(&self.records()?, student))
    }

    /// Records matching `filter`, newest first.
    pub fn filtered_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, RollbookError> {
        Ok(query::filtered_records(&self.records()?, filter))
    }

    /// Classes `viewer` may read; `None` means every class.
    #[must_use]
    pub fn scope_for(&self, viewer: &Actor) -> Option<TeacherScope> {
        TeacherScope::for_actor(&self.roster, viewer)
    }

    /// Roster students visible to `viewer` that match `filter`.
    pub fn filter_students(
        &self,
        viewer: &Actor,
        filter: &StudentFilter,
    ) -> Result<Vec<Student>, RollbookError> {
        let scope = self.scope_for(viewer);
        query::filter_students(&self.roster.students(), filter, scope.as_ref())
    }

    /// Status counts over the records matching `filter`.
    pub fn summary(&self, filter: &RecordFilter) -> Result<AttendanceSummary, RollbookError> {
        Ok(AttendanceSummary::from_records(&self.filtered_records(filter)?))
    }

    /// Whether every roster member could have a record for the class/date,
    /// judged by record count.
    pub fn roster_complete(&self, class: &ClassId, date: NaiveDate) -> Result<bool, RollbookError> {
        let roster = self.class_roster(class)?;
        SubmissionCoordinator::roster_complete(self.backend.store(), &roster, date)
    }

    pub fn submission_state(
        &self,
        class: &ClassId,
        date: NaiveDate,
    ) -> Result<SubmissionState, RollbookError> {
        let roster = self.class_roster(class)?;
        self.backend.store().submission(&roster.class_id, date)
    }

    pub fn record_count(&self) -> Result<usize, RollbookError> {
        self.backend.store().record_count()
    }

    /// Everything in the store, for export.
    pub fn snapshot(&self) -> Result<Snapshot, RollbookError> {
        Snapshot::capture(self.backend.store())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn records(&self) -> Result<Vec<AttendanceRecord>, RollbookError> {
        self.backend.store().records()
    }

    fn class_roster(&self, class: &ClassId) -> Result<ClassRoster, RollbookError> {
        class.validate()?;
        self.roster
            .class_roster(class)
            .ok_or_else(|| RollbookError::ClassNotFound(class.clone()))
    }

    fn report<T>(
        &self,
        result: &Result<T, RollbookError>,
        on_success: impl FnOnce(&T) -> Vec<Notification>,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };
        match result {
            Ok(value) => on_success(value).into_iter().for_each(|n| sink.notify(n)),
            Err(error) => sink.notify(Notification::failed(error)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notification::{CollectingSink, NotificationLevel};
    use crate::roster::ClassEntry;
    use crate::{ActorId, Role};
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 7).expect("date")
    }

    fn directory() -> RosterDirectory {
        let mut dir = RosterDirectory::new();
        dir.add_class(ClassEntry {
            id: ClassId::new("C1"),
            name: "Year 7 Blue".to_string(),
            teacher_id: ActorId::new("T"),
        })
        .expect("class");
        for (id, name) in [("S1", "Ada Byron"), ("S2", "Alan Turing")] {
            dir.enroll(Student {
                id: StudentId::new(id),
                name: name.to_string(),
                class_id: ClassId::new("C1"),
            })
            .expect("enroll");
        }
        dir
    }

    struct SharedSink(Arc<CollectingSink>);

    impl NotificationSink for SharedSink {
        fn notify(&self, notification: Notification) {
            self.0.notify(notification);
        }
    }

    #[test]
    fn unknown_class_is_reported() {
        let mut register = Register::new(directory()).with_clock(FixedClock::new(today()));
        let err = register.mark_attendance(
            &Actor::admin("A"),
            MarkRequest::new("S1", "C9", today(), AttendanceStatus::Present),
        );
        assert!(matches!(err, Err(RollbookError::ClassNotFound(_))));
    }

    #[test]
    fn notifications_use_student_names() {
        let sink = Arc::new(CollectingSink::new());
        let mut register = Register::new(directory())
            .with_clock(FixedClock::new(today()))
            .with_sink(SharedSink(Arc::clone(&sink)));

        register
            .mark_attendance(
                &Actor::teacher("T"),
                MarkRequest::new("S1", "C1", today(), AttendanceStatus::Present),
            )
            .expect("mark");
        let yesterday = today().pred_opt().expect("date");
        let _ = register.mark_attendance(
            &Actor::teacher("T"),
            MarkRequest::new("S2", "C1", yesterday, AttendanceStatus::Present),
        );

        let received = sink.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].message, "Marked Present for Ada Byron");
        assert_eq!(received[1].level, NotificationLevel::Failure);
        assert_eq!(
            received[1].message,
            "Attendance can only be taken for the current day"
        );
    }

    #[test]
    fn import_replaces_in_memory_contents() {
        let mut source = Register::new(directory()).with_clock(FixedClock::new(today()));
        source
            .submit_attendance(&Actor::admin("A"), &ClassId::new("C1"), today())
            .expect("submit");
        let snapshot = source.snapshot().expect("snapshot");

        let mut target = Register::new(directory()).with_clock(FixedClock::new(today()));
        assert_eq!(target.import(snapshot).expect("import"), 2);
        assert_eq!(target.record_count().expect("count"), 2);
        assert!(
            target
                .submission_state(&ClassId::new("C1"), today())
                .expect("state")
                .is_submitted()
        );
    }

    #[test]
    fn filter_students_scopes_by_viewer() {
        let register = Register::new(directory());
        let all = register
            .filter_students(&Actor::teacher("T"), &StudentFilter::default())
            .expect("filter");
        assert_eq!(all.len(), 2);

        let none = register
            .filter_students(&Actor::teacher("U"), &StudentFilter::default())
            .expect("filter");
        assert!(none.is_empty());

        let parent = register
            .filter_students(&Actor::new("P", Role::Parent), &StudentFilter::default())
            .expect("filter");
        assert!(parent.is_empty());
    }

    #[test]
    fn record_reads_follow_viewer_scope() {
        let mut register = Register::new(directory()).with_clock(FixedClock::new(today()));
        register
            .mark_attendance(
                &Actor::teacher("T"),
                MarkRequest::new("S1", "C1", today(), AttendanceStatus::Late),
            )
            .expect("mark");
        let s1 = StudentId::new("S1");

        assert_eq!(
            register
                .visible_status(&Actor::teacher("T"), &s1, today())
                .expect("status"),
            Some(AttendanceStatus::Late)
        );
        assert_eq!(
            register
                .visible_status(&Actor::teacher("U"), &s1, today())
                .expect("status"),
            None
        );

        let everything = RecordFilter::default();
        let for_parent =
            everything.clone().within(register.scope_for(&Actor::new("P", Role::Parent)));
        assert!(register.filtered_records(&for_parent).expect("records").is_empty());
        let for_admin = everything.within(register.scope_for(&Actor::admin("A")));
        assert_eq!(register.filtered_records(&for_admin).expect("records").len(), 1);
    }

    #[test]
    fn redb_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("register.redb");
        {
            let mut register = Register::with_redb(&path, directory())
                .expect("open")
                .with_clock(FixedClock::new(today()));
            assert!(register.is_persistent());
            register
                .mark_attendance(
                    &Actor::teacher("T"),
                    MarkRequest::new("S1", "C1", today(), AttendanceStatus::Late),
                )
                .expect("mark");
        }
        let register = Register::with_redb(&path, directory()).expect("reopen");
        assert_eq!(
            register
                .attendance_status(&StudentId::new("S1"), today())
                .expect("status"),
            Some(AttendanceStatus::Late)
        );
    }
}
