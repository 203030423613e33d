//! API service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::error;

use crate::{AppState, middleware::auth_middleware};

mod notifications;
mod requests;
mod rides;
mod user;

/// Create the router for the API service
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let protected_routes = Router::new()
        .route("/rides", post(rides::create_ride))
        .route("/rides/filter", get(rides::filter_rides))
        .route("/rides/:ride_id", delete(rides::delete_ride))
        .route("/rides/:ride_id/join", post(requests::send_join_request))
        .route("/rides/:ride_id/request", delete(requests::cancel_join_request))
        .route("/rides/:ride_id/board", post(rides::join_ride))
        .route("/rides/:ride_id/participation", delete(rides::leave_ride))
        .route("/rides/:ride_id/requests", get(requests::list_pending_requests))
        .route("/requests/:request_id/approve", post(requests::approve_request))
        .route("/requests/:request_id/deny", post(requests::deny_request))
        .route("/requests/:request_id/revoke", post(requests::revoke_request))
        .route("/user/rides/posted", get(user::list_posted_rides))
        .route("/user/rides/joined", get(user::list_joined_rides))
        .route("/user/requests", get(requests::list_sent_requests))
        .route(
            "/user/involvement/:date",
            get(user::check_involvement).delete(user::clear_involvement),
        )
        .route("/user/notifications", get(notifications::list_notifications))
        .route(
            "/user/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/user/notifications/read-all",
            put(notifications::mark_all_read),
        )
        .route(
            "/notifications/:notification_id/read",
            post(notifications::mark_notification_read),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            Ok(false) => "unavailable",
            Err(e) => {
                error!("Database health check failed: {}", e);
                "unavailable"
            }
        },
        None => "not configured",
    };

    let status = if database == "unavailable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "rides-api",
            "database": database,
        })),
    )
}
