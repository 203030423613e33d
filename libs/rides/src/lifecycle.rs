//! Ride lifecycle: creation, cascading deletion, boarding and listings

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ConflictError, RideError, RideResult};
use crate::involvement::build_report;
use crate::models::{NewRide, NotificationKind, Participant, RequestStatus, Ride, User};
use crate::service::RideService;
use crate::store::{StoreResult, StoreSession};
use crate::validation::{parse_ride_date, validate_new_ride};

/// Rows removed by a ride cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeCounts {
    pub notifications: u64,
    pub participants: u64,
    pub requests: u64,
}

/// Result of a leader cancelling their ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RideDeletion {
    pub ride_id: Uuid,
    pub participants: usize,
    pub participants_notified: usize,
}

/// Remove a ride and everything hanging off it, children first
///
/// Notifications are purged only when `purge_notifications` is set; the
/// expiry sweep keeps them as history.
pub(crate) async fn cascade_delete(
    session: &mut dyn StoreSession,
    ride_id: Uuid,
    purge_notifications: bool,
) -> StoreResult<CascadeCounts> {
    let mut counts = CascadeCounts::default();

    if purge_notifications {
        counts.notifications = session.delete_notifications_of(ride_id).await?;
    }
    counts.participants = session.delete_participants_of(ride_id).await?;
    counts.requests = session.delete_requests_of(ride_id).await?;
    session.delete_ride(ride_id).await?;

    Ok(counts)
}

/// External identities of the current participants of a ride
pub(crate) async fn participant_recipients(
    session: &mut dyn StoreSession,
    participants: &[Participant],
) -> StoreResult<Vec<String>> {
    let mut recipients = Vec::with_capacity(participants.len());

    for participant in participants {
        match session.user_by_id(participant.user_id).await? {
            Some(user) => recipients.push(user.external_id),
            None => warn!(
                "Participant {} of ride {} has no user record",
                participant.user_id, participant.ride_id
            ),
        }
    }

    Ok(recipients)
}

impl RideService {
    /// Post a new ride led by `leader`
    ///
    /// Refused while the leader is involved in anything on the ride's date.
    pub async fn create_ride(&self, leader: &User, new_ride: NewRide) -> RideResult<Ride> {
        let date = validate_new_ride(&new_ride)?;
        let now = self.now();
        let mut session = self.begin().await?;

        let report = build_report(session.as_mut(), leader, date).await?;
        if report.has_involvement {
            return Err(ConflictError::InvolvementExists {
                date,
                report: Box::new(report),
            }
            .into());
        }

        let ride = Ride {
            id: Uuid::new_v4(),
            leader_id: leader.id,
            origin: new_ride.origin,
            destination: new_ride.destination,
            date,
            time: new_ride.time,
            seats: new_ride.seats,
            seats_filled: 0,
            price: new_ride.price,
            created_at: now,
            updated_at: now,
        };
        session.insert_ride(&ride).await?;
        session.commit().await?;
        info!("Ride {} created by leader {} for {}", ride.id, leader.id, date);

        Ok(ride)
    }

    /// Cancel a ride; leader only
    ///
    /// Deletes the ride with its notifications, participants and requests in
    /// one transaction, then tells each former participant. A failed
    /// notification does not undo the deletion.
    pub async fn delete_ride(&self, leader: &User, ride_id: Uuid) -> RideResult<RideDeletion> {
        let mut session = self.begin().await?;

        let ride = session
            .lock_ride(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;
        if ride.leader_id != leader.id {
            return Err(RideError::Forbidden(
                "You can only delete your own rides".to_string(),
            ));
        }

        let participants = session.participants_of(ride.id).await?;
        let recipients = participant_recipients(session.as_mut(), &participants).await?;

        let counts = match cascade_delete(session.as_mut(), ride.id, true).await {
            Ok(counts) => counts,
            Err(e) => {
                error!("Failed to delete ride {}: {}", ride.id, e);
                return Err(e.into());
            }
        };
        session.commit().await?;
        info!(
            "Ride {} deleted by leader {}: {} participants, {} requests, {} notifications removed",
            ride.id, leader.id, counts.participants, counts.requests, counts.notifications
        );

        let mut outbox = self.outbox();
        for recipient in &recipients {
            outbox.push(
                recipient,
                NotificationKind::RideCancelled,
                ride.id,
                "Ride Cancelled by Leader",
                format!(
                    "The ride {} has been cancelled by the leader {}",
                    ride.itinerary(),
                    leader.name
                ),
            );
        }
        let delivery = self.dispatch(outbox).await;

        Ok(RideDeletion {
            ride_id: ride.id,
            participants: participants.len(),
            participants_notified: delivery.delivered,
        })
    }

    /// Rides led by `user`
    pub async fn list_posted_rides(&self, user: &User) -> RideResult<Vec<Ride>> {
        let mut session = self.begin().await?;
        Ok(session.rides_led_by(user.id, None).await?)
    }

    /// Rides in which `user` holds a seat
    pub async fn list_joined_rides(&self, user: &User) -> RideResult<Vec<Ride>> {
        let mut session = self.begin().await?;
        let ride_ids: Vec<Uuid> = session
            .participations_of(user.id, None)
            .await?
            .into_iter()
            .map(|p| p.ride_id)
            .collect();

        if ride_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(session.rides_by_ids(&ride_ids).await?)
    }

    /// Rides matching origin, destination and date exactly
    pub async fn filter_rides(
        &self,
        origin: &str,
        destination: &str,
        date: &str,
    ) -> RideResult<Vec<Ride>> {
        let date = parse_ride_date(date)?;
        let mut session = self.begin().await?;
        Ok(session.find_rides(origin, destination, date).await?)
    }

    /// Take a seat using an approved privilege
    ///
    /// The privilege is consumed: the request row is deleted in the same
    /// transaction that adds the participant and increments the seat count.
    pub async fn join_ride(&self, user: &User, ride_id: Uuid) -> RideResult<Participant> {
        let now = self.now();
        let mut session = self.begin().await?;

        let ride = session
            .lock_ride(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;

        let request = session.request_for(ride.id, user.id).await?;
        let privilege = match request {
            Some(request) if request.status == RequestStatus::Approved => request,
            _ => {
                let participants = session.participants_of(ride.id).await?;
                if participants.iter().any(|p| p.user_id == user.id) {
                    return Err(ConflictError::AlreadyJoined.into());
                }
                return Err(RideError::not_found("approved request"));
            }
        };

        if !ride.has_free_seat() {
            return Err(ConflictError::RideFull.into());
        }

        let participant = Participant {
            ride_id: ride.id,
            user_id: user.id,
            joined_at: now,
        };
        session
            .set_seats_filled(ride.id, ride.seats_filled + 1, now)
            .await?;
        session.insert_participant(&participant).await?;
        session.delete_requests(&[privilege.id]).await?;

        let leader = session.user_by_id(ride.leader_id).await?;
        session.commit().await?;
        info!("User {} joined ride {}", user.id, ride.id);

        if let Some(leader) = leader {
            let mut outbox = self.outbox();
            outbox.push(
                &leader.external_id,
                NotificationKind::ParticipantJoined,
                ride.id,
                "Participant Joined",
                format!("{} has joined your ride {}", user.name, ride.itinerary()),
            );
            self.dispatch(outbox).await;
        }

        Ok(participant)
    }

    /// Give up a seat
    pub async fn leave_ride(&self, user: &User, ride_id: Uuid) -> RideResult<()> {
        let now = self.now();
        let mut session = self.begin().await?;

        let ride = session
            .lock_ride(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;

        if session.delete_participant(ride.id, user.id).await? == 0 {
            return Err(RideError::not_found("participation"));
        }
        session
            .set_seats_filled(ride.id, (ride.seats_filled - 1).max(0), now)
            .await?;

        let leader = session.user_by_id(ride.leader_id).await?;
        session.commit().await?;
        info!("User {} left ride {}", user.id, ride.id);

        if let Some(leader) = leader {
            let mut outbox = self.outbox();
            outbox.push(
                &leader.external_id,
                NotificationKind::ParticipantLeft,
                ride.id,
                "Participant Left",
                format!("{} has left your ride {}", user.name, ride.itinerary()),
            );
            self.dispatch(outbox).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailPoint, MemoryStore};
    use chrono::Utc;

    fn new_ride(date: &str) -> NewRide {
        NewRide {
            origin: "North Gate".to_string(),
            destination: "Central Station".to_string(),
            date: date.to_string(),
            time: "07:10".to_string(),
            seats: 1,
            price: 2.5,
        }
    }

    async fn setup() -> (MemoryStore, RideService, User, User) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let leader = User::new("uid-leader", "Lena", None, now);
        let rider = User::new("uid-rider", "Ravi", None, now);
        store.insert_user(leader.clone()).await;
        store.insert_user(rider.clone()).await;
        (store.clone(), RideService::from_store(store), leader, rider)
    }

    #[tokio::test]
    async fn test_create_ride_starts_empty() {
        let (store, service, leader, _) = setup().await;

        let ride = service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap();

        assert_eq!(ride.seats_filled, 0);
        assert_eq!(store.rides().await, vec![ride]);
    }

    #[tokio::test]
    async fn test_create_ride_blocked_by_involvement() {
        let (store, service, leader, _) = setup().await;
        service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap();

        let err = service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap_err();

        match err {
            RideError::Conflict(ConflictError::InvolvementExists { report, .. }) => {
                assert_eq!(report.summary.posted_count, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.rides().await.len(), 1);

        service
            .create_ride(&leader, new_ride("2025-06-11"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_consumes_privilege() {
        let (store, service, leader, rider) = setup().await;
        let ride = service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap();
        let request = service.send_join_request(&rider, ride.id).await.unwrap();
        service.approve_request(&leader, request.id).await.unwrap();

        service.join_ride(&rider, ride.id).await.unwrap();

        assert!(store.requests().await.is_empty());
        assert_eq!(store.rides().await[0].seats_filled, 1);
        assert_eq!(
            service.list_joined_rides(&rider).await.unwrap()[0].id,
            ride.id
        );

        let err = service.join_ride(&rider, ride.id).await.unwrap_err();
        assert!(matches!(
            err,
            RideError::Conflict(ConflictError::AlreadyJoined)
        ));
    }

    #[tokio::test]
    async fn test_leave_frees_seat() {
        let (store, service, leader, rider) = setup().await;
        let ride = service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap();
        let request = service.send_join_request(&rider, ride.id).await.unwrap();
        service.approve_request(&leader, request.id).await.unwrap();
        service.join_ride(&rider, ride.id).await.unwrap();

        service.leave_ride(&rider, ride.id).await.unwrap();

        assert_eq!(store.rides().await[0].seats_filled, 0);
        assert!(store.participants().await.is_empty());
        assert!(matches!(
            service.leave_ride(&rider, ride.id).await,
            Err(RideError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_cascade_rolls_back() {
        let (store, service, leader, _) = setup().await;
        let ride = service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap();
        store.fail_at(FailPoint::DeleteRide);

        let err = service.delete_ride(&leader, ride.id).await.unwrap_err();

        assert!(matches!(err, RideError::Transaction(_)));
        assert_eq!(store.rides().await.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_rides_exact_match() {
        let (_, service, leader, _) = setup().await;
        let ride = service
            .create_ride(&leader, new_ride("2025-06-10"))
            .await
            .unwrap();

        let found = service
            .filter_rides("North Gate", "Central Station", "2025-06-10")
            .await
            .unwrap();
        assert_eq!(found, vec![ride]);

        assert!(service
            .filter_rides("north gate", "Central Station", "2025-06-10")
            .await
            .unwrap()
            .is_empty());
        assert!(service
            .filter_rides("North Gate", "Central Station", "June 10")
            .await
            .is_err());
    }
}
