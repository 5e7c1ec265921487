//! # API Errors
//!
//! Maps `RollbookError` onto HTTP status codes and a JSON `ErrorResponse`.

use super::types::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rollbook_core::RollbookError;

/// HTTP status for a core error.
///
/// | Error                                   | Status |
/// |-----------------------------------------|--------|
/// | permission denied, date constraint      | 403    |
/// | validation failed                       | 400    |
/// | class or record not found               | 404    |
/// | duplicate key, concurrent modification  | 409    |
/// | storage and format errors               | 500    |
#[must_use]
pub fn status_for(error: &RollbookError) -> StatusCode {
    match error {
        RollbookError::PermissionDenied(_) | RollbookError::DateConstraintViolated { .. } => {
            StatusCode::FORBIDDEN
        }
        RollbookError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        RollbookError::ClassNotFound(_) | RollbookError::RecordNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RollbookError::DuplicateKey(_) | RollbookError::ConcurrentModification { .. } => {
            StatusCode::CONFLICT
        }
        RollbookError::SerializationError(_)
        | RollbookError::DeserializationError(_)
        | RollbookError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// 401: the caller did not say who it is.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorResponse::new("unauthenticated", msg),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RollbookError> for ApiError {
    fn from(e: RollbookError) -> Self {
        let status = status_for(&e);
        if status.is_server_error() {
            tracing::error!(kind = e.kind(), "{}", e);
        } else {
            tracing::debug!(kind = e.kind(), "{}", e);
        }
        Self {
            status,
            body: ErrorResponse::from(&e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollbook_core::{ClassId, RecordId};

    #[test]
    fn every_category_has_its_status() {
        let day = NaiveDate::from_ymd_opt(2024, 9, 16).expect("date");
        let cases = [
            (RollbookError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
            (
                RollbookError::DateConstraintViolated {
                    date: day,
                    today: day,
                },
                StatusCode::FORBIDDEN,
            ),
            (RollbookError::ValidationFailed("x".into()), StatusCode::BAD_REQUEST),
            (RollbookError::ClassNotFound(ClassId::new("C9")), StatusCode::NOT_FOUND),
            (RollbookError::RecordNotFound(RecordId(4)), StatusCode::NOT_FOUND),
            (
                RollbookError::ConcurrentModification {
                    id: RecordId(1),
                    expected: 1,
                    found: 2,
                },
                StatusCode::CONFLICT,
            ),
            (RollbookError::IoError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{}", error.kind());
        }
    }

    #[test]
    fn unauthorized_is_401() {
        assert_eq!(ApiError::unauthorized("who?").status(), StatusCode::UNAUTHORIZED);
    }
}
