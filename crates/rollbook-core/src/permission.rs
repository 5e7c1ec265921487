//! # Permission Evaluator
//!
//! Pure decision functions over `(actor, resource, date, today)`.
//!
//! Nothing here reads storage, clocks, or ambient state: every input is an
//! argument, so the full role × action × date matrix is testable in isolation.
//!
//! | role              | class access     | take (mark)      | edit others' records |
//! |-------------------|------------------|------------------|----------------------|
//! | admin / accounts  | every class      | any date         | yes                  |
//! | teacher           | owned class only | today only       | no (own records only)|
//! | student / parent  | none             | never            | no                   |

use crate::roster::ClassRoster;
use crate::{Actor, ActorId, AttendanceRecord, ClassId, Role, RollbookError, SubmissionState};
use chrono::NaiveDate;

// =============================================================================
// DECISIONS
// =============================================================================

/// Why an action was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The actor has no access to the class.
    NoClassAccess { class: ClassId },
    /// The actor may not act on this date.
    OutsideDateWindow { date: NaiveDate, today: NaiveDate },
    /// The record was taken by someone else and the actor cannot edit.
    NotRecordOwner { taken_by: ActorId },
    /// The class/date was submitted and the actor cannot reopen it.
    SubmissionLocked { class: ClassId, date: NaiveDate },
    /// The action needs an elevated role.
    NotElevated { role: Role },
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Map a denial onto the error taxonomy.
    pub fn into_result(self) -> Result<(), RollbookError> {
        let Self::Deny(denial) = self else {
            return Ok(());
        };
        Err(match denial {
            Denial::NoClassAccess { class } => {
                RollbookError::PermissionDenied(format!("no access to class {}", class))
            }
            Denial::OutsideDateWindow { date, today } => {
                RollbookError::DateConstraintViolated { date, today }
            }
            Denial::NotRecordOwner { taken_by } => RollbookError::PermissionDenied(format!(
                "record was taken by {} and cannot be edited",
                taken_by
            )),
            Denial::SubmissionLocked { class, date } => RollbookError::PermissionDenied(format!(
                "attendance for class {} on {} is already submitted",
                class, date
            )),
            Denial::NotElevated { role } => {
                RollbookError::PermissionDenied(format!("role {} cannot perform this action", role))
            }
        })
    }
}

// =============================================================================
// PRIMITIVE RULES
// =============================================================================

/// Admin/accounts see every class; a teacher sees only the class they own.
#[must_use]
pub fn has_access_to_class(actor: &Actor, roster: &ClassRoster) -> bool {
    match actor.role {
        Role::Admin | Role::Accounts => true,
        Role::Teacher => roster.teacher_id == actor.id,
        Role::Student | Role::Parent => false,
    }
}

/// Admin/accounts may mark any date; a teacher only today.
#[must_use]
pub fn can_take_attendance(actor: &Actor, date: NaiveDate, today: NaiveDate) -> bool {
    match actor.role {
        Role::Admin | Role::Accounts => true,
        Role::Teacher => date == today,
        Role::Student | Role::Parent => false,
    }
}

/// Only admin/accounts may edit records taken by someone else.
#[must_use]
pub fn can_edit_attendance(actor: &Actor) -> bool {
    actor.role.is_elevated()
}

/// Only admin/accounts may reopen a submitted class/date.
#[must_use]
pub fn can_unlock_submission(actor: &Actor) -> bool {
    actor.role.is_elevated()
}

// =============================================================================
// COMPOSITE CHECKS
// =============================================================================

/// Gate for marking (and submitting) a class on a date: access, then date.
#[must_use]
pub fn check_mark(
    actor: &Actor,
    roster: &ClassRoster,
    date: NaiveDate,
    today: NaiveDate,
) -> Decision {
    if !has_access_to_class(actor, roster) {
        return Decision::Deny(Denial::NoClassAccess {
            class: roster.class_id.clone(),
        });
    }
    if !can_take_attendance(actor, date, today) {
        return Decision::Deny(Denial::OutsideDateWindow { date, today });
    }
    Decision::Allow
}

/// Gate for mutating an existing record, assuming `check_mark` already passed.
///
/// A non-editor may only re-take a record they created themselves.
#[must_use]
pub fn check_overwrite(actor: &Actor, existing: &AttendanceRecord) -> Decision {
    if can_edit_attendance(actor) || existing.taken_by == actor.id {
        Decision::Allow
    } else {
        Decision::Deny(Denial::NotRecordOwner {
            taken_by: existing.taken_by.clone(),
        })
    }
}

/// Gate for writing into a class/date that may already be submitted.
#[must_use]
pub fn check_not_locked(
    actor: &Actor,
    state: &SubmissionState,
    class: &ClassId,
    date: NaiveDate,
) -> Decision {
    if state.is_submitted() && !actor.role.is_elevated() {
        Decision::Deny(Denial::SubmissionLocked {
            class: class.clone(),
            date,
        })
    } else {
        Decision::Allow
    }
}

/// Gate for reopening a submitted class/date.
#[must_use]
pub fn check_unlock(actor: &Actor) -> Decision {
    if can_unlock_submission(actor) {
        Decision::Allow
    } else {
        Decision::Deny(Denial::NotElevated { role: actor.role })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttendanceStatus, RecordId, StudentId};
    use std::collections::BTreeSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).expect("date")
    }

    fn roster_owned_by(teacher: &str) -> ClassRoster {
        ClassRoster {
            class_id: ClassId::new("C1"),
            name: "Class 1".to_string(),
            teacher_id: ActorId::new(teacher),
            students: BTreeSet::from([StudentId::new("S1")]),
        }
    }

    fn record_taken_by(taker: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: RecordId(1),
            student: StudentId::new("S1"),
            class: ClassId::new("C1"),
            date: day(10),
            status: AttendanceStatus::Present,
            remark: None,
            taken_by: ActorId::new(taker),
            edited_by: None,
            edited_at: None,
            version: 1,
        }
    }

    #[test]
    fn class_access_matrix() {
        let roster = roster_owned_by("T");
        let cases = [
            (Actor::new("A", Role::Admin), true),
            (Actor::new("X", Role::Accounts), true),
            (Actor::new("T", Role::Teacher), true),
            (Actor::new("U", Role::Teacher), false),
            (Actor::new("T", Role::Student), false),
            (Actor::new("P", Role::Parent), false),
        ];
        for (actor, expected) in cases {
            assert_eq!(
                has_access_to_class(&actor, &roster),
                expected,
                "{:?}",
                actor
            );
        }
    }

    #[test]
    fn take_attendance_date_matrix() {
        let today = day(10);
        let dates = [(day(9), false), (day(10), true), (day(11), false)];
        for role in Role::ALL {
            let actor = Actor::new("someone", role);
            for (date, teacher_allowed) in dates {
                let expected = match role {
                    Role::Admin | Role::Accounts => true,
                    Role::Teacher => teacher_allowed,
                    Role::Student | Role::Parent => false,
                };
                assert_eq!(
                    can_take_attendance(&actor, date, today),
                    expected,
                    "{} on {}",
                    role,
                    date
                );
            }
        }
    }

    #[test]
    fn only_elevated_roles_edit_and_unlock() {
        for role in Role::ALL {
            let actor = Actor::new("a", role);
            assert_eq!(can_edit_attendance(&actor), role.is_elevated());
            assert_eq!(check_unlock(&actor).is_allowed(), role.is_elevated());
        }
    }

    #[test]
    fn check_mark_prefers_access_over_date() {
        let roster = roster_owned_by("T");
        let stranger = Actor::teacher("U");
        let result = check_mark(&stranger, &roster, day(1), day(10)).into_result();
        assert!(matches!(result, Err(RollbookError::PermissionDenied(_))));

        let owner = Actor::teacher("T");
        let result = check_mark(&owner, &roster, day(1), day(10)).into_result();
        assert!(matches!(
            result,
            Err(RollbookError::DateConstraintViolated { .. })
        ));

        assert!(check_mark(&owner, &roster, day(10), day(10)).is_allowed());
    }

    #[test]
    fn overwrite_requires_editor_or_owner() {
        let record = record_taken_by("T");
        assert!(check_overwrite(&Actor::teacher("T"), &record).is_allowed());
        assert!(check_overwrite(&Actor::admin("A"), &record).is_allowed());
        assert!(check_overwrite(&Actor::new("X", Role::Accounts), &record).is_allowed());
        assert_eq!(
            check_overwrite(&Actor::teacher("U"), &record),
            Decision::Deny(Denial::NotRecordOwner {
                taken_by: ActorId::new("T")
            })
        );
    }

    #[test]
    fn submitted_state_locks_non_elevated_roles() {
        let class = ClassId::new("C1");
        let submitted = SubmissionState::Submitted {
            by: ActorId::new("T"),
            at: chrono::DateTime::default(),
        };
        assert!(!check_not_locked(&Actor::teacher("T"), &submitted, &class, day(10)).is_allowed());
        assert!(check_not_locked(&Actor::admin("A"), &submitted, &class, day(10)).is_allowed());
        assert!(
            check_not_locked(&Actor::teacher("T"), &SubmissionState::Open, &class, day(10))
                .is_allowed()
        );
    }
}
