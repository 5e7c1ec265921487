//! # Rollbook HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (no actor headers needed)
//! - `POST /attendance/mark` - Mark one student
//! - `POST /attendance/mark-many` - Mark several students of one class
//! - `POST /attendance/submit` - Submit a class/date
//! - `POST /attendance/unlock` - Reopen a submitted class/date
//! - `GET /attendance/submission` - Submission state of a class/date
//! - `GET /attendance/status` - Status of a student on a date
//! - `GET /attendance/history` - Records of a student, newest first
//! - `GET /attendance/records` - Filtered records
//! - `GET /attendance/summary` - Present/late/absent counts
//! - `GET /students` - Roster students visible to the caller
//!
//! ## Configuration (Environment Variables)
//!
//! - `ROLLBOOK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `ROLLBOOK_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod auth;
mod error;
mod handlers;
mod middleware;
mod types;

pub use auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, RequestActor};
pub use error::{ApiError, status_for};
pub use middleware::{DEFAULT_RATE_LIMIT, create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ClassDateRequest, ErrorResponse, HealthResponse, HistoryQuery, MarkAttendanceRequest,
    MarkManyRequest, MarkManyResponse, MarkResponse, RecordsQuery, RecordsResponse, StatusQuery,
    StatusResponse, StudentsQuery, StudentsResponse, SubmissionQuery, SubmissionStatusResponse,
    SubmitResponse, UnlockResponse,
};

use crate::cli::write_snapshot;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use rollbook_core::{Register, RollbookError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the register.
#[derive(Clone)]
pub struct AppState {
    pub register: Arc<RwLock<Register>>,
    /// Snapshot file rewritten after every change (file backend only).
    pub snapshot_path: Option<PathBuf>,
}

impl AppState {
    #[must_use]
    pub fn new(register: Register) -> Self {
        Self {
            register: Arc::new(RwLock::new(register)),
            snapshot_path: None,
        }
    }

    /// Persist the in-memory store to `path` after each mutation.
    #[must_use]
    pub fn with_snapshot_file(mut self, path: &Path) -> Self {
        self.snapshot_path = Some(path.to_path_buf());
        self
    }

    /// Apply one mutation and persist it.
    ///
    /// With a snapshot file, the register is restored to its prior contents
    /// when the file cannot be written, so memory never holds a change the
    /// file lacks. redb commits inside the mutation itself.
    pub fn commit<T>(
        &self,
        register: &mut Register,
        mutation: impl FnOnce(&mut Register) -> Result<T, RollbookError>,
    ) -> Result<T, RollbookError> {
        let path = match &self.snapshot_path {
            Some(path) if !register.is_persistent() => path,
            _ => return mutation(register),
        };

        let before = register.snapshot()?;
        let value = mutation(register)?;
        if let Err(e) = write_snapshot(register, path) {
            tracing::error!("Snapshot write failed, rolling back: {}", e);
            register.import(before)?;
            return Err(e);
        }
        Ok(value)
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `ROLLBOOK_CORS_ORIGINS`:
/// - `*`: every origin
/// - unset: localhost only
/// - otherwise: the comma-separated origins listed
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("ROLLBOOK_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (ROLLBOOK_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in ROLLBOOK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No ROLLBOOK_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ACTOR_ID_HEADER),
            HeaderName::from_static(ACTOR_ROLE_HEADER),
        ])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - 2 MB
/// 4. Rate Limiting - if enabled
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/attendance/mark", post(handlers::mark_handler))
        .route("/attendance/mark-many", post(handlers::mark_many_handler))
        .route("/attendance/submit", post(handlers::submit_handler))
        .route("/attendance/unlock", post(handlers::unlock_handler))
        .route("/attendance/submission", get(handlers::submission_handler))
        .route("/attendance/status", get(handlers::status_handler))
        .route("/attendance/history", get(handlers::history_handler))
        .route("/attendance/records", get(handlers::records_handler))
        .route("/attendance/summary", get(handlers::summary_handler))
        .route("/students", get(handlers::students_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server; returns after Ctrl+C or SIGTERM.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), RollbookError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RollbookError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Rollbook HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RollbookError::IoError(format!("Server error: {}", e)))?;

    tracing::info!("Rollbook HTTP server stopped");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
