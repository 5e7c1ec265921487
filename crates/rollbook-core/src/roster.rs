//! # Roster Provider
//!
//! Class membership and ownership are external collaborator data. The core
//! only needs to know, per class, which students are enrolled and which
//! teacher owns it. Student names are used for messages, never for decisions.

use crate::{ActorId, ClassId, RollbookError, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An enrolled student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub class_id: ClassId,
}

/// A class with its owning teacher and enrolled students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRoster {
    pub class_id: ClassId,
    pub name: String,
    pub teacher_id: ActorId,
    pub students: BTreeSet<StudentId>,
}

impl ClassRoster {
    #[must_use]
    pub fn is_enrolled(&self, student: &StudentId) -> bool {
        self.students.contains(student)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.students.len()
    }
}

/// Read access to roster data.
pub trait RosterProvider: Send + Sync {
    /// Roster of one class, or `None` if the class is unknown.
    fn class_roster(&self, class: &ClassId) -> Option<ClassRoster>;

    /// One student, or `None` if unknown.
    fn student(&self, id: &StudentId) -> Option<Student>;

    /// Every known student.
    fn students(&self) -> Vec<Student>;

    /// Every known class.
    fn classes(&self) -> Vec<ClassRoster>;

    /// Display name for messages; falls back to the id.
    fn student_name(&self, id: &StudentId) -> String {
        self.student(id)
            .map(|s| s.name)
            .unwrap_or_else(|| id.to_string())
    }
}

// =============================================================================
// ROSTER FILE
// =============================================================================

/// A class entry as written in a roster file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: ClassId,
    #[serde(default)]
    pub name: String,
    pub teacher_id: ActorId,
}

/// On-disk roster layout: `[[classes]]` and `[[students]]` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
    #[serde(default)]
    pub students: Vec<Student>,
}

// =============================================================================
// IN-MEMORY DIRECTORY
// =============================================================================

/// In-memory roster built from a `RosterFile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RosterFile")]
pub struct RosterDirectory {
    classes: BTreeMap<ClassId, ClassRoster>,
    students: BTreeMap<StudentId, Student>,
}

impl RosterDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class. Fails if the id is taken.
    pub fn add_class(&mut self, entry: ClassEntry) -> Result<(), RollbookError> {
        entry.id.validate()?;
        entry.teacher_id.validate()?;
        if self.classes.contains_key(&entry.id) {
            return Err(RollbookError::ValidationFailed(format!(
                "Duplicate class id: {}",
                entry.id
            )));
        }
        let name = if entry.name.is_empty() {
            entry.id.to_string()
        } else {
            entry.name
        };
        self.classes.insert(
            entry.id.clone(),
            ClassRoster {
                class_id: entry.id,
                name,
                teacher_id: entry.teacher_id,
                students: BTreeSet::new(),
            },
        );
        Ok(())
    }

    /// Enroll a student into an existing class. Fails on duplicates.
    pub fn enroll(&mut self, student: Student) -> Result<(), RollbookError> {
        student.id.validate()?;
        if self.students.contains_key(&student.id) {
            return Err(RollbookError::ValidationFailed(format!(
                "Duplicate student id: {}",
                student.id
            )));
        }
        let class = self
            .classes
            .get_mut(&student.class_id)
            .ok_or_else(|| RollbookError::ClassNotFound(student.class_id.clone()))?;
        class.students.insert(student.id.clone());
        self.students.insert(student.id.clone(), student);
        Ok(())
    }

    /// Remove a student from the roster. Their attendance records are untouched.
    pub fn withdraw(&mut self, id: &StudentId) -> Option<Student> {
        let student = self.students.remove(id)?;
        if let Some(class) = self.classes.get_mut(&student.class_id) {
            class.students.remove(id);
        }
        Some(student)
    }

    /// Export back to the file layout.
    #[must_use]
    pub fn to_file(&self) -> RosterFile {
        RosterFile {
            classes: self
                .classes
                .values()
                .map(|c| ClassEntry {
                    id: c.class_id.clone(),
                    name: c.name.clone(),
                    teacher_id: c.teacher_id.clone(),
                })
                .collect(),
            students: self.students.values().cloned().collect(),
        }
    }
}

impl TryFrom<RosterFile> for RosterDirectory {
    type Error = RollbookError;

    fn try_from(file: RosterFile) -> Result<Self, Self::Error> {
        let mut directory = Self::new();
        for class in file.classes {
            directory.add_class(class)?;
        }
        for student in file.students {
            directory.enroll(student)?;
        }
        Ok(directory)
    }
}

impl RosterProvider for RosterDirectory {
    fn class_roster(&self, class: &ClassId) -> Option<ClassRoster> {
        self.classes.get(class).cloned()
    }

    fn student(&self, id: &StudentId) -> Option<Student> {
        self.students.get(id).cloned()
    }

    fn students(&self) -> Vec<Student> {
        self.students.values().cloned().collect()
    }

    fn classes(&self) -> Vec<ClassRoster> {
        self.classes.values().cloned().collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: &str, teacher: &str) -> ClassEntry {
        ClassEntry {
            id: ClassId::new(id),
            name: String::new(),
            teacher_id: ActorId::new(teacher),
        }
    }

    fn student(id: &str, name: &str, class_id: &str) -> Student {
        Student {
            id: StudentId::new(id),
            name: name.to_string(),
            class_id: ClassId::new(class_id),
        }
    }

    #[test]
    fn builds_rosters_from_file() {
        let file = RosterFile {
            classes: vec![class("C1", "T"), class("C2", "U")],
            students: vec![
                student("S1", "Alice", "C1"),
                student("S2", "Bob", "C1"),
                student("S3", "Cara", "C2"),
            ],
        };
        let directory = RosterDirectory::try_from(file).expect("roster");

        let c1 = directory.class_roster(&ClassId::new("C1")).expect("C1");
        assert_eq!(c1.size(), 2);
        assert_eq!(c1.teacher_id, ActorId::new("T"));
        assert_eq!(c1.name, "C1");
        assert!(c1.is_enrolled(&StudentId::new("S2")));
        assert!(!c1.is_enrolled(&StudentId::new("S3")));
        assert_eq!(directory.student_name(&StudentId::new("S3")), "Cara");
        assert_eq!(directory.student_name(&StudentId::new("S9")), "S9");
    }

    #[test]
    fn rejects_unknown_class_and_duplicates() {
        let unknown = RosterFile {
            classes: vec![class("C1", "T")],
            students: vec![student("S1", "Alice", "C9")],
        };
        assert!(matches!(
            RosterDirectory::try_from(unknown),
            Err(RollbookError::ClassNotFound(_))
        ));

        let duplicate = RosterFile {
            classes: vec![class("C1", "T"), class("C1", "U")],
            students: vec![],
        };
        assert!(matches!(
            RosterDirectory::try_from(duplicate),
            Err(RollbookError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_control_characters_in_ids() {
        let mut directory = RosterDirectory::new();
        assert!(matches!(
            directory.add_class(class("C1\u{1f}2024-01-01", "T")),
            Err(RollbookError::ValidationFailed(_))
        ));

        directory.add_class(class("C1", "T")).expect("class");
        assert!(matches!(
            directory.enroll(student("S1\u{1f}x", "Alice", "C1")),
            Err(RollbookError::ValidationFailed(_))
        ));
        assert_eq!(directory.class_roster(&ClassId::new("C1")).expect("C1").size(), 0);
    }

    #[test]
    fn withdraw_removes_membership() {
        let mut directory = RosterDirectory::new();
        directory.add_class(class("C1", "T")).expect("class");
        directory
            .enroll(student("S1", "Alice", "C1"))
            .expect("enroll");

        assert!(directory.withdraw(&StudentId::new("S1")).is_some());
        let c1 = directory.class_roster(&ClassId::new("C1")).expect("C1");
        assert_eq!(c1.size(), 0);
        assert!(directory.withdraw(&StudentId::new("S1")).is_none());
    }

    #[test]
    fn file_round_trip_keeps_membership() {
        let mut directory = RosterDirectory::new();
        directory.add_class(class("C1", "T")).expect("class");
        directory
            .enroll(student("S1", "Alice", "C1"))
            .expect("enroll");

        let rebuilt = RosterDirectory::try_from(directory.to_file()).expect("rebuild");
        assert_eq!(rebuilt, directory);
    }
}
