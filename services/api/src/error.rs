//! Custom error types for the API service

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rides::{ConflictError, RideError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, malformed or expired bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Body or query string that does not decode into the expected shape
    #[error("{0}")]
    Payload(String),

    /// Failure reported by the ride service
    #[error(transparent)]
    Ride(#[from] RideError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Payload(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Payload(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            ApiError::Payload(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Ride(err) => ride_error(err),
        };

        (status, Json(body)).into_response()
    }
}

fn ride_error(err: RideError) -> (StatusCode, serde_json::Value) {
    match err {
        RideError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        RideError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": err.to_string() })),
        RideError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
        RideError::Conflict(conflict) => (StatusCode::CONFLICT, conflict_body(&conflict)),
        RideError::Transaction(e) => {
            error!("Ride operation rolled back: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            )
        }
    }
}

/// Conflict bodies carry what the caller needs to resolve them
fn conflict_body(conflict: &ConflictError) -> serde_json::Value {
    let message = conflict.to_string();

    match conflict {
        ConflictError::InvolvementExists { date, report } => json!({
            "error": message,
            "date": date,
            "action_required": "clear_involvement",
            "involvement_details": report,
        }),
        ConflictError::LeaderSameDay { date } => json!({
            "error": message,
            "date": date,
        }),
        ConflictError::CooldownActive { remaining_minutes } => json!({
            "error": message,
            "remaining_cooldown_minutes": remaining_minutes,
        }),
        _ => json!({ "error": message }),
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
