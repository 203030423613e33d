//! Per-user notification mailbox
//!
//! Notifications are addressed to a user's external identity. They keep
//! their ride id after the ride is gone, in which case the ride fields are
//! reported as "Unknown" and the ride status as deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{RideError, RideResult};
use crate::models::{Ride, User};
use crate::service::RideService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Deleted,
}

/// A notification enriched with the current state of its ride
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ride_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub time: String,
    pub ride_status: RideStatus,
}

impl RideService {
    /// The caller's notifications, newest first
    pub async fn list_notifications(&self, user: &User) -> RideResult<Vec<NotificationView>> {
        let mut session = self.begin().await?;
        let notifications = session.notifications_for(&user.external_id).await?;

        let mut ride_ids: Vec<Uuid> = notifications.iter().map(|n| n.ride_id).collect();
        ride_ids.sort_unstable();
        ride_ids.dedup();
        let rides: HashMap<Uuid, Ride> = if ride_ids.is_empty() {
            HashMap::new()
        } else {
            session
                .rides_by_ids(&ride_ids)
                .await?
                .into_iter()
                .map(|r| (r.id, r))
                .collect()
        };

        let views = notifications
            .into_iter()
            .map(|n| {
                let ride = rides.get(&n.ride_id);
                let field = |f: fn(&Ride) -> String| {
                    ride.map(f).unwrap_or_else(|| "Unknown".to_string())
                };

                NotificationView {
                    origin: field(|r| r.origin.clone()),
                    destination: field(|r| r.destination.clone()),
                    date: field(|r| r.date.to_string()),
                    time: field(|r| r.time.clone()),
                    ride_status: if ride.is_some() {
                        RideStatus::Active
                    } else {
                        RideStatus::Deleted
                    },
                    id: n.id,
                    title: n.title,
                    message: n.message,
                    kind: n.kind,
                    ride_id: n.ride_id,
                    is_read: n.is_read,
                    created_at: n.created_at,
                }
            })
            .collect();

        Ok(views)
    }

    /// Mark one of the caller's notifications as read
    pub async fn mark_notification_read(
        &self,
        user: &User,
        notification_id: Uuid,
    ) -> RideResult<()> {
        let now = self.now();
        let mut session = self.begin().await?;

        let updated = session
            .mark_notification_read(notification_id, &user.external_id, now)
            .await?;
        if updated == 0 {
            return Err(RideError::not_found("notification"));
        }
        session.commit().await?;

        Ok(())
    }

    /// Mark every notification of the caller as read, returning how many changed
    pub async fn mark_all_read(&self, user: &User) -> RideResult<u64> {
        let now = self.now();
        let mut session = self.begin().await?;

        let updated = session.mark_all_read(&user.external_id, now).await?;
        session.commit().await?;

        Ok(updated)
    }

    pub async fn unread_count(&self, user: &User) -> RideResult<i64> {
        let mut session = self.begin().await?;
        Ok(session.unread_count(&user.external_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Notification, NotificationKind};
    use crate::store::{MemoryStore, NotificationSink};

    #[tokio::test]
    async fn test_notifications_of_deleted_ride_show_unknown() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = User::new("uid-ravi", "Ravi", None, now);
        store.insert_user(user.clone()).await;
        let gone = Notification::new(
            "uid-ravi",
            NotificationKind::RideCancelled,
            Uuid::new_v4(),
            "Ride Cancelled by Leader",
            "cancelled",
            now,
        );
        store.append(&gone).await.unwrap();
        let service = RideService::from_store(store);

        let views = service.list_notifications(&user).await.unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].origin, "Unknown");
        assert_eq!(views[0].date, "Unknown");
        assert_eq!(views[0].ride_status, RideStatus::Deleted);
        assert_eq!(views[0].kind, "ride_cancelled");
    }

    #[tokio::test]
    async fn test_read_markers() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = User::new("uid-ravi", "Ravi", None, now);
        let other = User::new("uid-mia", "Mia", None, now);
        store.insert_user(user.clone()).await;
        store.insert_user(other.clone()).await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let n = Notification::new(
                "uid-ravi",
                NotificationKind::JoinRequest,
                Uuid::new_v4(),
                "New Join Request",
                "hello",
                now,
            );
            ids.push(n.id);
            store.append(&n).await.unwrap();
        }
        let service = RideService::from_store(store);

        service.mark_notification_read(&user, ids[0]).await.unwrap();
        assert_eq!(service.unread_count(&user).await.unwrap(), 2);

        assert!(matches!(
            service.mark_notification_read(&other, ids[1]).await,
            Err(RideError::NotFound(_))
        ));

        assert_eq!(service.mark_all_read(&user).await.unwrap(), 2);
        assert_eq!(service.unread_count(&user).await.unwrap(), 0);
    }
}
