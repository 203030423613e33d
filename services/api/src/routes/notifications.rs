//! Notification mailbox handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use rides::validation::parse_id;

use crate::{
    AppState,
    error::ApiResult,
    middleware::CurrentUser,
    models::{MarkedReadResponse, MessageResponse, NotificationsResponse, UnreadCountResponse},
};

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let notifications = state.rides.list_notifications(&user).await?;

    Ok(Json(NotificationsResponse {
        count: notifications.len(),
        notifications,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let unread_count = state.rides.unread_count(&user).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(notification_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let notification_id = parse_id(&notification_id, "notification")?;
    state
        .rides
        .mark_notification_read(&user, notification_id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Notification marked as read".to_string(),
    }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.rides.mark_all_read(&user).await?;

    Ok(Json(MarkedReadResponse {
        message: "All notifications marked as read".to_string(),
        updated,
    }))
}
