//! Join request handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rides::validation::parse_id;

use crate::{
    AppState,
    error::ApiResult,
    middleware::CurrentUser,
    models::{MessageResponse, PendingRequestsResponse, RequestResponse, SentRequestsResponse},
};

pub async fn send_join_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(ride_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ride_id = parse_id(&ride_id, "ride")?;
    let request = state.rides.send_join_request(&user, ride_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RequestResponse {
            message: "Join request sent successfully".to_string(),
            request,
        }),
    ))
}

pub async fn cancel_join_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(ride_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ride_id = parse_id(&ride_id, "ride")?;
    state.rides.cancel_join_request(&user, ride_id).await?;

    Ok(Json(MessageResponse {
        message: "Join request cancelled successfully".to_string(),
    }))
}

pub async fn list_sent_requests(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let requests = state.rides.list_sent_requests(&user).await?;

    Ok(Json(SentRequestsResponse {
        count: requests.len(),
        requests,
    }))
}

/// Pending requests for one of the caller's rides
pub async fn list_pending_requests(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(ride_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ride_id = parse_id(&ride_id, "ride")?;
    let requests = state.rides.list_pending_requests(&user, ride_id).await?;

    Ok(Json(PendingRequestsResponse {
        ride_id,
        count: requests.len(),
        requests,
    }))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(request_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let request_id = parse_id(&request_id, "request")?;
    let request = state.rides.approve_request(&user, request_id).await?;

    Ok(Json(RequestResponse {
        message: "Request approved successfully".to_string(),
        request,
    }))
}

pub async fn deny_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(request_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let request_id = parse_id(&request_id, "request")?;
    let request = state.rides.deny_request(&user, request_id).await?;

    Ok(Json(RequestResponse {
        message: "Request denied successfully".to_string(),
        request,
    }))
}

pub async fn revoke_request(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(request_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let request_id = parse_id(&request_id, "request")?;
    let request = state.rides.revoke_request(&user, request_id).await?;

    Ok(Json(RequestResponse {
        message: "Request revoked successfully".to_string(),
        request,
    }))
}
