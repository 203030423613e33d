//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Notification entity
///
/// Notifications reference their ride by id only and outlive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    /// External identity of the recipient
    pub recipient: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ride_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Build an unread notification stamped with `now`
    pub fn new(
        recipient: impl Into<String>,
        kind: NotificationKind,
        ride_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            title: title.into(),
            message: message.into(),
            kind: kind.as_str().to_string(),
            ride_id,
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Type tags emitted by the ride and request flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JoinRequest,
    RequestApproved,
    RequestDenied,
    RequestRevoked,
    ParticipantJoined,
    ParticipantLeft,
    RideCancelled,
    RideCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::JoinRequest => "join_request",
            NotificationKind::RequestApproved => "request_approved",
            NotificationKind::RequestDenied => "request_denied",
            NotificationKind::RequestRevoked => "request_revoked",
            NotificationKind::ParticipantJoined => "participant_joined",
            NotificationKind::ParticipantLeft => "participant_left",
            NotificationKind::RideCancelled => "ride_cancelled",
            NotificationKind::RideCompleted => "ride_completed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
