//! API models for request and response payloads

use rides::models::{JoinRequest, Participant, Ride};
use rides::{ClearedInvolvement, NotificationView, PendingRequestView, SentRequestView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query string of the ride search
#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct RideResponse {
    pub message: String,
    pub ride: Ride,
}

#[derive(Serialize)]
pub struct RideListResponse {
    pub rides: Vec<Ride>,
    pub count: usize,
}

impl From<Vec<Ride>> for RideListResponse {
    fn from(rides: Vec<Ride>) -> Self {
        Self {
            count: rides.len(),
            rides,
        }
    }
}

#[derive(Serialize)]
pub struct RideDeletedResponse {
    pub message: String,
    pub ride_id: Uuid,
    pub participants: usize,
    pub participants_notified: usize,
}

#[derive(Serialize)]
pub struct BoardedResponse {
    pub message: String,
    pub participant: Participant,
}

#[derive(Serialize)]
pub struct RequestResponse {
    pub message: String,
    pub request: JoinRequest,
}

#[derive(Serialize)]
pub struct SentRequestsResponse {
    pub requests: Vec<SentRequestView>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PendingRequestsResponse {
    pub ride_id: Uuid,
    pub requests: Vec<PendingRequestView>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub message: String,
    #[serde(flatten)]
    pub cleared: ClearedInvolvement,
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationView>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct MarkedReadResponse {
    pub message: String,
    pub updated: u64,
}
