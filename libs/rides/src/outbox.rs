//! Post-commit notification effects
//!
//! Flows collect the notifications they owe while their transaction is open
//! and dispatch them only after it commits. Each delivery failure is logged
//! and counted, never propagated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Notification, NotificationKind};
use crate::store::NotificationSink;

/// Outcome of dispatching an [`Outbox`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub attempted: usize,
    pub delivered: usize,
}

/// Notifications waiting for their transaction to commit
#[derive(Debug)]
pub struct Outbox {
    now: DateTime<Utc>,
    pending: Vec<Notification>,
}

impl Outbox {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            pending: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        recipient: &str,
        kind: NotificationKind,
        ride_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.pending.push(Notification::new(
            recipient, kind, ride_id, title, message, self.now,
        ));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver every pending notification, one independent attempt each
    pub async fn dispatch(self, sink: &dyn NotificationSink) -> Delivery {
        let mut delivery = Delivery::default();

        for notification in self.pending {
            delivery.attempted += 1;
            match sink.append(&notification).await {
                Ok(()) => {
                    delivery.delivered += 1;
                    debug!(
                        "Created {} notification for {} on ride {}",
                        notification.kind, notification.recipient, notification.ride_id
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to create {} notification for {} on ride {}: {}",
                        notification.kind, notification.recipient, notification.ride_id, e
                    );
                }
            }
        }

        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_dispatch_counts_failures_without_stopping() {
        let store = MemoryStore::new();
        store.fail_delivery_to("uid-bob");

        let ride_id = Uuid::new_v4();
        let mut outbox = Outbox::new(Utc::now());
        for recipient in ["uid-alice", "uid-bob", "uid-carol"] {
            outbox.push(
                recipient,
                NotificationKind::RideCancelled,
                ride_id,
                "Ride Cancelled by Leader",
                "cancelled",
            );
        }
        assert_eq!(outbox.len(), 3);

        let delivery = outbox.dispatch(&store).await;

        assert_eq!(
            delivery,
            Delivery {
                attempted: 3,
                delivered: 2
            }
        );
        let recipients: Vec<String> = store
            .notifications()
            .await
            .into_iter()
            .map(|n| n.recipient)
            .collect();
        assert_eq!(recipients, vec!["uid-alice", "uid-carol"]);
    }
}
