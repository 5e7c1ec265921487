//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Every handler except `/health` needs a [`RequestActor`]. Mutations take
//! the write lock and run one core operation through [`AppState::commit`]
//! before the lock is released. Record reads only see the classes in the
//! caller's scope: admin and accounts see everything, teachers their own
//! classes, students and parents nothing.

use super::{
    AppState,
    auth::RequestActor,
    error::ApiError,
    types::{
        ClassDateRequest, HealthResponse, HistoryQuery, MarkAttendanceRequest, MarkManyRequest,
        MarkManyResponse, MarkResponse, RecordsQuery, RecordsResponse, StatusQuery,
        StatusResponse, StudentsQuery, StudentsResponse, SubmissionQuery,
        SubmissionStatusResponse, SubmitResponse, UnlockResponse,
    },
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rollbook_core::{
    AttendanceSummary, ClassId, Filter, RecordFilter, StudentFilter, StudentId,
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// MARK HANDLERS
// =============================================================================

/// Mark one student.
pub async fn mark_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(request): Json<MarkAttendanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut register = state.register.write().await;
    let request = request.into_request(register.today());
    let outcome = state.commit(&mut register, |r| r.mark_attendance(&actor, request))?;

    Ok((StatusCode::OK, Json(MarkResponse::from(outcome))))
}

/// Mark several students of one class on one date.
pub async fn mark_many_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(request): Json<MarkManyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut register = state.register.write().await;
    let date = request.date.unwrap_or_else(|| register.today());
    let class = ClassId::new(request.class);
    let outcomes = state.commit(&mut register, |r| {
        r.mark_many(&actor, &class, date, request.entries)
    })?;

    Ok((StatusCode::OK, Json(MarkManyResponse::from(outcomes))))
}

// =============================================================================
// SUBMISSION HANDLERS
// =============================================================================

/// Submit a class/date; unmarked roster members become absent.
pub async fn submit_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(request): Json<ClassDateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut register = state.register.write().await;
    let date = request.date.unwrap_or_else(|| register.today());
    let class = ClassId::new(request.class);
    let report = state.commit(&mut register, |r| r.submit_attendance(&actor, &class, date))?;

    Ok((
        StatusCode::OK,
        Json(SubmitResponse {
            success: true,
            report,
        }),
    ))
}

/// Reopen a submitted class/date.
pub async fn unlock_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(request): Json<ClassDateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut register = state.register.write().await;
    let date = request.date.unwrap_or_else(|| register.today());
    let class = ClassId::new(request.class);
    let previous = state.commit(&mut register, |r| r.unlock_submission(&actor, &class, date))?;

    Ok((
        StatusCode::OK,
        Json(UnlockResponse {
            success: true,
            class,
            date,
            previous,
        }),
    ))
}

/// Explicit submission state plus the derived roster condition.
pub async fn submission_handler(
    State(state): State<AppState>,
    RequestActor(_actor): RequestActor,
    Query(query): Query<SubmissionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.register.read().await;
    let date = query.date.unwrap_or_else(|| register.today());
    let class = ClassId::new(query.class);

    let response = SubmissionStatusResponse {
        state: register.submission_state(&class, date)?,
        roster_complete: register.roster_complete(&class, date)?,
        class,
        date,
    };
    Ok((StatusCode::OK, Json(response)))
}

// =============================================================================
// QUERY HANDLERS
// =============================================================================

/// Status of a student on a date, within the caller's classes.
pub async fn status_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.register.read().await;
    let date = query.date.unwrap_or_else(|| register.today());
    let student = StudentId::new(query.student);
    let status = register.visible_status(&actor, &student, date)?;

    Ok((
        StatusCode::OK,
        Json(StatusResponse {
            student,
            date,
            status,
        }),
    ))
}

/// Every visible record of a student, newest first.
pub async fn history_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.register.read().await;
    let student = StudentId::new(query.student);
    student.validate()?;
    let filter = RecordFilter::new(Filter::All, Filter::Only(student))
        .within(register.scope_for(&actor));
    let records = register.filtered_records(&filter)?;

    Ok((StatusCode::OK, Json(RecordsResponse::from(records))))
}

/// Visible records matching the class/student/date filters.
pub async fn records_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.register.read().await;
    let filter = record_filter(&query).within(register.scope_for(&actor));
    let records = register.filtered_records(&filter)?;

    Ok((StatusCode::OK, Json(RecordsResponse::from(records))))
}

/// Present/late/absent counts over the visible matching records.
pub async fn summary_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.register.read().await;
    let filter = record_filter(&query).within(register.scope_for(&actor));
    let summary: AttendanceSummary = register.summary(&filter)?;

    Ok((StatusCode::OK, Json(summary)))
}

/// Roster students visible to the caller.
pub async fn students_handler(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<StudentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let register = state.register.read().await;
    let filter = StudentFilter {
        class: filter_param(query.class.as_deref()),
        student: filter_param(query.student.as_deref()),
        search: query.search.unwrap_or_default(),
    };
    let students = register.filter_students(&actor, &filter)?;

    Ok((StatusCode::OK, Json(StudentsResponse::from(students))))
}

// =============================================================================
// HELPERS
// =============================================================================

fn filter_param<T: for<'a> From<&'a str>>(raw: Option<&str>) -> Filter<T> {
    raw.map(Filter::parse).unwrap_or_default()
}

fn record_filter(query: &RecordsQuery) -> RecordFilter {
    let filter = RecordFilter::new(
        filter_param(query.class.as_deref()),
        filter_param(query.student.as_deref()),
    );
    match query.date {
        Some(date) => filter.on(date),
        None => filter,
    }
}
