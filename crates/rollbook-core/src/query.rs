//! # Query/Filter Layer
//!
//! Read-only views over a snapshot of records or roster students.
//! Nothing here mutates or performs I/O; callers pass in what they read.

use crate::primitives::{ALL_FILTER, MAX_SEARCH_TERM_LENGTH};
use crate::roster::{RosterProvider, Student};
use crate::{Actor, AttendanceRecord, AttendanceStatus, ClassId, RollbookError, Role, StudentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// FILTERS
// =============================================================================

/// Either everything or exactly one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T: PartialEq> Filter<T> {
    #[must_use]
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => expected == value,
        }
    }
}

impl<T: for<'a> From<&'a str>> Filter<T> {
    /// Parse a UI selector; `"all"` (any case) or an empty string selects everything.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_FILTER) {
            Self::All
        } else {
            Self::Only(T::from(raw))
        }
    }
}

impl<T> From<Option<T>> for Filter<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::All, Self::Only)
    }
}

/// Selection over attendance records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub class: Filter<ClassId>,
    pub student: Filter<StudentId>,
    pub date: Filter<NaiveDate>,
    /// Classes the caller may see; `None` is unrestricted.
    #[serde(skip)]
    pub scope: Option<TeacherScope>,
}

impl RecordFilter {
    #[must_use]
    pub fn new(class: Filter<ClassId>, student: Filter<StudentId>) -> Self {
        Self {
            class,
            student,
            date: Filter::All,
            scope: None,
        }
    }

    #[must_use]
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Filter::Only(date);
        self
    }

    /// Restrict to the classes in `scope`.
    #[must_use]
    pub fn within(mut self, scope: Option<TeacherScope>) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.class.matches(&record.class)
            && self.student.matches(&record.student)
            && self.date.matches(&record.date)
            && self.scope.as_ref().is_none_or(|s| s.contains(&record.class))
    }
}

/// Selection over roster students.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFilter {
    pub class: Filter<ClassId>,
    pub student: Filter<StudentId>,
    /// Case-insensitive substring of name or id; empty matches everyone.
    pub search: String,
}

/// Classes a caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherScope {
    pub classes: BTreeSet<ClassId>,
}

impl TeacherScope {
    /// Scope for an actor: `None` means unrestricted.
    ///
    /// Teachers see the classes they own. Students and parents get an empty
    /// scope since they have no class access.
    pub fn for_actor(provider: &dyn RosterProvider, actor: &Actor) -> Option<Self> {
        match actor.role {
            Role::Admin | Role::Accounts => None,
            Role::Teacher => Some(Self {
                classes: provider
                    .classes()
                    .into_iter()
                    .filter(|c| c.teacher_id == actor.id)
                    .map(|c| c.class_id)
                    .collect(),
            }),
            Role::Student | Role::Parent => Some(Self {
                classes: BTreeSet::new(),
            }),
        }
    }

    #[must_use]
    pub fn contains(&self, class: &ClassId) -> bool {
        self.classes.contains(class)
    }
}

// =============================================================================
// RECORD VIEWS
// =============================================================================

/// Status of a student on a date, in any class.
///
/// If the student has records in several classes that day, the one created
/// first (lowest id) wins.
#[must_use]
pub fn attendance_status(
    records: &[AttendanceRecord],
    student: &StudentId,
    date: NaiveDate,
) -> Option<AttendanceStatus> {
    records
        .iter()
        .filter(|r| &r.student == student && r.date == date)
        .min_by_key(|r| r.id)
        .map(|r| r.status)
}

/// All records of a student, newest date first.
#[must_use]
pub fn student_history(records: &[AttendanceRecord], student: &StudentId) -> Vec<AttendanceRecord> {
    filtered_records(
        records,
        &RecordFilter::new(Filter::All, Filter::Only(student.clone())),
    )
}

/// Records matching `filter`, newest date first, then by class and student.
#[must_use]
pub fn filtered_records(
    records: &[AttendanceRecord],
    filter: &RecordFilter,
) -> Vec<AttendanceRecord> {
    let mut selected: Vec<AttendanceRecord> = records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.class.cmp(&b.class))
            .then_with(|| a.student.cmp(&b.student))
    });
    selected
}

// =============================================================================
// STUDENT VIEWS
// =============================================================================

/// Roster students matching `filter`, restricted to `scope` when given.
/// Sorted by name, then id.
pub fn filter_students(
    students: &[Student],
    filter: &StudentFilter,
    scope: Option<&TeacherScope>,
) -> Result<Vec<Student>, RollbookError> {
    let search = filter.search.trim();
    if search.len() > MAX_SEARCH_TERM_LENGTH {
        return Err(RollbookError::ValidationFailed(format!(
            "search term exceeds {} bytes",
            MAX_SEARCH_TERM_LENGTH
        )));
    }
    let needle = search.to_lowercase();

    let mut selected: Vec<Student> = students
        .iter()
        .filter(|s| filter.class.matches(&s.class_id))
        .filter(|s| filter.student.matches(&s.id))
        .filter(|s| scope.is_none_or(|scope| scope.contains(&s.class_id)))
        .filter(|s| {
            needle.is_empty()
                || s.name.to_lowercase().contains(&needle)
                || s.id.as_str().to_lowercase().contains(&needle)
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(selected)
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Status counts over a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub total: usize,
    /// Present and late over total, rounded down. Zero when empty.
    pub attendance_rate_percent: u8,
}

impl AttendanceSummary {
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Late => summary.late += 1,
                AttendanceStatus::Absent => summary.absent += 1,
            }
            summary.total += 1;
        }
        if summary.total > 0 {
            let attended = summary.present + summary.late;
            let percent = attended.saturating_mul(100) / summary.total;
            summary.attendance_rate_percent = u8::try_from(percent).unwrap_or(100);
        }
        summary
    }
}

// =============================================================================
// TESTS
// =============================================================================
