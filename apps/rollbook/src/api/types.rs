//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use chrono::NaiveDate;
use rollbook_core::{
    AttendanceRecord, AttendanceStatus, ClassId, MarkChange, MarkEntry, MarkOutcome, MarkRequest,
    RollbookError, Student, StudentId, SubmissionReport, SubmissionState,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable snake_case category, e.g. `permission_denied`.
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.into(),
            error: msg.into(),
        }
    }
}

impl From<&RollbookError> for ErrorResponse {
    fn from(e: &RollbookError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

// =============================================================================
// MARK REQUEST/RESPONSE
// =============================================================================

/// Mark one student. `date` defaults to today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAttendanceRequest {
    pub class: String,
    pub student: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl MarkAttendanceRequest {
    /// Core request, with `today` filled in when no date was sent.
    pub fn into_request(self, today: NaiveDate) -> MarkRequest {
        let request = MarkRequest::new(
            self.student,
            self.class,
            self.date.unwrap_or(today),
            self.status,
        );
        match self.remark {
            Some(remark) => request.with_remark(remark),
            None => request,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkResponse {
    pub success: bool,
    pub change: MarkChange,
    pub record: AttendanceRecord,
}

impl From<MarkOutcome> for MarkResponse {
    fn from(outcome: MarkOutcome) -> Self {
        Self {
            success: true,
            change: outcome.change,
            record: outcome.record,
        }
    }
}

/// Mark several students of one class on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkManyRequest {
    pub class: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub entries: Vec<MarkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkManyResponse {
    pub success: bool,
    pub created: usize,
    pub updated: usize,
    pub outcomes: Vec<MarkOutcome>,
}

impl From<Vec<MarkOutcome>> for MarkManyResponse {
    fn from(outcomes: Vec<MarkOutcome>) -> Self {
        let created = outcomes
            .iter()
            .filter(|o| o.change == MarkChange::Created)
            .count();
        Self {
            success: true,
            created,
            updated: outcomes.len() - created,
            outcomes,
        }
    }
}

// =============================================================================
// SUBMISSION REQUEST/RESPONSE
// =============================================================================

/// Target of `submit` and `unlock`. `date` defaults to today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDateRequest {
    pub class: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub report: SubmissionReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub success: bool,
    pub class: ClassId,
    pub date: NaiveDate,
    /// State before the unlock.
    pub previous: SubmissionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionStatusResponse {
    pub class: ClassId,
    pub date: NaiveDate,
    pub state: SubmissionState,
    pub roster_complete: bool,
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusQuery {
    pub student: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub student: String,
}

/// Record selection; absent or `"all"` means no filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub student: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentsQuery {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub student: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionQuery {
    pub class: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// =============================================================================
// QUERY RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub student: StudentId,
    pub date: NaiveDate,
    /// `null` when the student has not been marked.
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub count: usize,
    pub records: Vec<AttendanceRecord>,
}

impl From<Vec<AttendanceRecord>> for RecordsResponse {
    fn from(records: Vec<AttendanceRecord>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentsResponse {
    pub count: usize,
    pub students: Vec<Student>,
}

impl From<Vec<Student>> for StudentsResponse {
    fn from(students: Vec<Student>) -> Self {
        Self {
            count: students.len(),
            students,
        }
    }
}
