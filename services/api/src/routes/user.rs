//! Per-caller ride and involvement handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::ApiResult,
    middleware::CurrentUser,
    models::{ClearedResponse, RideListResponse},
};

pub async fn list_posted_rides(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let rides = state.rides.list_posted_rides(&user).await?;
    Ok(Json(RideListResponse::from(rides)))
}

pub async fn list_joined_rides(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let rides = state.rides.list_joined_rides(&user).await?;
    Ok(Json(RideListResponse::from(rides)))
}

/// Everything the caller is tied to on a date
pub async fn check_involvement(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(date): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let report = state.rides.check_involvement(&user, &date).await?;
    Ok(Json(report))
}

/// Drop the caller's pending requests and approved privileges on a date
pub async fn clear_involvement(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(date): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let cleared = state.rides.clear_involvement(&user, &date).await?;

    Ok(Json(ClearedResponse {
        message: format!("Cleared involvement for {}", cleared.date),
        cleared,
    }))
}
