//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::NaiveDate;
use rollbook::api::{
    ClassDateRequest, ErrorResponse, HealthResponse, MarkAttendanceRequest, MarkManyResponse,
    RecordsQuery, StatusResponse,
};
use rollbook_core::{
    AttendanceStatus, MarkChange, MarkOutcome, NewRecord, RecordId, RollbookError, StudentId,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// MARK REQUEST TESTS
// =============================================================================

#[test]
fn test_mark_request_minimal() {
    let json = r#"{"class":"C1","student":"S1","status":"Late"}"#;
    let request: MarkAttendanceRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.status, AttendanceStatus::Late);
    assert!(request.date.is_none());
    assert!(request.remark.is_none());
}

#[test]
fn test_mark_request_defaults_to_today() {
    let json = r#"{"class":"C1","student":"S1","status":"absent","remark":"ill"}"#;
    let request: MarkAttendanceRequest = serde_json::from_str(json).unwrap();

    let core = request.into_request(day(16));
    assert_eq!(core.date, day(16));
    assert_eq!(core.status, AttendanceStatus::Absent);
    assert_eq!(core.remark.as_deref(), Some("ill"));
}

#[test]
fn test_mark_request_explicit_date_wins() {
    let json = r#"{"class":"C1","student":"S1","status":"Present","date":"2024-09-02"}"#;
    let request: MarkAttendanceRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.into_request(day(16)).date, day(2));
}

#[test]
fn test_mark_request_rejects_unknown_status() {
    let json = r#"{"class":"C1","student":"S1","status":"Excused"}"#;
    assert!(serde_json::from_str::<MarkAttendanceRequest>(json).is_err());
}

#[test]
fn test_mark_request_rejects_bad_date() {
    let json = r#"{"class":"C1","student":"S1","status":"Present","date":"16/09/2024"}"#;
    assert!(serde_json::from_str::<MarkAttendanceRequest>(json).is_err());
}

#[test]
fn test_class_date_request_without_date() {
    let request: ClassDateRequest = serde_json::from_str(r#"{"class":"C1"}"#).unwrap();
    assert_eq!(request.class, "C1");
    assert!(request.date.is_none());
}

// =============================================================================
// RESPONSE TESTS
// =============================================================================

#[test]
fn test_mark_many_response_counts_changes() {
    let record = NewRecord {
        key: rollbook_core::NaturalKey::new(StudentId::new("S1"), "C1".into(), day(16)),
        status: AttendanceStatus::Present,
        remark: None,
        taken_by: "T".into(),
    }
    .into_record(RecordId(1));
    let outcomes = vec![
        MarkOutcome {
            record: record.clone(),
            change: MarkChange::Created,
        },
        MarkOutcome {
            record,
            change: MarkChange::Updated,
        },
    ];

    let response = MarkManyResponse::from(outcomes);
    assert!(response.success);
    assert_eq!(response.created, 1);
    assert_eq!(response.updated, 1);
}

#[test]
fn test_status_response_unmarked_is_null() {
    let response = StatusResponse {
        student: StudentId::new("S1"),
        date: day(16),
        status: None,
    };

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"status\":null"));
    assert!(json.contains("\"date\":\"2024-09-16\""));
}

#[test]
fn test_error_response_from_core_error() {
    let error = RollbookError::DateConstraintViolated {
        date: day(15),
        today: day(16),
    };
    let body = ErrorResponse::from(&error);

    assert!(!body.success);
    assert_eq!(body.kind, "date_constraint_violated");
    assert_eq!(body.error, "Attendance can only be taken for the current day");
}

#[test]
fn test_records_query_all_optional() {
    let query: RecordsQuery = serde_json::from_str("{}").unwrap();
    assert!(query.class.is_none());
    assert!(query.student.is_none());
    assert!(query.date.is_none());
}
