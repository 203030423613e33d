//! Ride handlers

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use rides::models::NewRide;
use rides::validation::parse_id;

use crate::{
    AppState,
    error::ApiResult,
    middleware::CurrentUser,
    models::{
        BoardedResponse, FilterQuery, MessageResponse, RideDeletedResponse, RideListResponse,
        RideResponse,
    },
};

/// Post a new ride led by the caller
pub async fn create_ride(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<NewRide>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let ride = state.rides.create_ride(&user, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(RideResponse {
            message: "Ride created successfully".to_string(),
            ride,
        }),
    ))
}

/// Search rides by exact origin, destination and date
pub async fn filter_rides(
    State(state): State<AppState>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let rides = state
        .rides
        .filter_rides(&query.origin, &query.destination, &query.date)
        .await?;

    Ok(Json(RideListResponse::from(rides)))
}

/// Cancel one of the caller's rides
pub async fn delete_ride(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(ride_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ride_id = parse_id(&ride_id, "ride")?;
    let deletion = state.rides.delete_ride(&user, ride_id).await?;

    Ok(Json(RideDeletedResponse {
        message: "Ride deleted successfully".to_string(),
        ride_id: deletion.ride_id,
        participants: deletion.participants,
        participants_notified: deletion.participants_notified,
    }))
}

/// Take a seat using an approved request
pub async fn join_ride(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(ride_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ride_id = parse_id(&ride_id, "ride")?;
    let participant = state.rides.join_ride(&user, ride_id).await?;

    Ok(Json(BoardedResponse {
        message: "Joined ride successfully".to_string(),
        participant,
    }))
}

/// Give up a seat
pub async fn leave_ride(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(ride_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ride_id = parse_id(&ride_id, "ride")?;
    state.rides.leave_ride(&user, ride_id).await?;

    Ok(Json(MessageResponse {
        message: "Left ride successfully".to_string(),
    }))
}
