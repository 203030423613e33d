//! Per-user, per-date involvement ledger
//!
//! A user is "involved" on a date when they lead a ride, hold a seat, have a
//! pending request, or hold an approved privilege for a ride on that date.
//! Creating a ride or sending a request is refused while any other
//! involvement exists; clearing removes the user's outstanding requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::RideResult;
use crate::models::{RequestStatus, Ride, User};
use crate::service::RideService;
use crate::store::{StoreResult, StoreSession};
use crate::validation::parse_ride_date;

/// Everything a user is involved in on one date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvolvementReport {
    pub has_involvement: bool,
    pub date: NaiveDate,
    pub details: InvolvementDetails,
    pub summary: InvolvementSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvolvementDetails {
    pub posted_rides: Vec<PostedRideEntry>,
    pub joined_rides: Vec<JoinedRideEntry>,
    pub pending_requests: Vec<PendingRequestEntry>,
    pub approved_privileges: Vec<ApprovedPrivilegeEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvolvementSummary {
    pub posted_count: usize,
    pub joined_count: usize,
    pub pending_count: usize,
    pub approved_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedRideEntry {
    pub ride_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub seats: i32,
    pub seats_filled: i32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRideEntry {
    pub ride_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub price: f64,
    pub leader_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingRequestEntry {
    pub request_id: Uuid,
    pub ride_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub price: f64,
    pub leader_name: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovedPrivilegeEntry {
    pub request_id: Uuid,
    pub ride_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub time: String,
    pub price: f64,
    pub leader_name: String,
    pub approved_at: DateTime<Utc>,
    pub seats_available: i32,
    pub can_join: bool,
}

/// Result of clearing a user's involvement on one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearedInvolvement {
    pub cancelled_requests: usize,
    pub cancelled_privileges: usize,
    pub total_cancelled: usize,
    pub date: NaiveDate,
}

impl InvolvementReport {
    fn new(date: NaiveDate, details: InvolvementDetails) -> Self {
        let summary = InvolvementSummary {
            posted_count: details.posted_rides.len(),
            joined_count: details.joined_rides.len(),
            pending_count: details.pending_requests.len(),
            approved_count: details.approved_privileges.len(),
            total_count: details.posted_rides.len()
                + details.joined_rides.len()
                + details.pending_requests.len()
                + details.approved_privileges.len(),
        };

        Self {
            has_involvement: summary.total_count > 0,
            date,
            details,
            summary,
        }
    }
}

/// Leader display names, looked up once per leader
#[derive(Default)]
struct LeaderNames(HashMap<Uuid, String>);

impl LeaderNames {
    async fn get(
        &mut self,
        session: &mut dyn StoreSession,
        leader_id: Uuid,
    ) -> StoreResult<String> {
        if let Some(name) = self.0.get(&leader_id) {
            return Ok(name.clone());
        }

        let name = session
            .user_by_id(leader_id)
            .await?
            .map(|u| u.name)
            .unwrap_or_else(|| "Unknown".to_string());
        self.0.insert(leader_id, name.clone());
        Ok(name)
    }
}

/// Build the involvement report of `user` on `date` inside `session`
///
/// Entries whose ride no longer exists are skipped and not counted.
pub(crate) async fn build_report(
    session: &mut dyn StoreSession,
    user: &User,
    date: NaiveDate,
) -> StoreResult<InvolvementReport> {
    let mut details = InvolvementDetails::default();
    let mut leaders = LeaderNames::default();

    for ride in session.rides_led_by(user.id, Some(date)).await? {
        details.posted_rides.push(PostedRideEntry {
            ride_id: ride.id,
            origin: ride.origin,
            destination: ride.destination,
            time: ride.time,
            seats: ride.seats,
            seats_filled: ride.seats_filled,
            price: ride.price,
        });
    }

    for participant in session.participations_of(user.id, Some(date)).await? {
        let Some(ride) = session.ride_by_id(participant.ride_id).await? else {
            continue;
        };
        let leader_name = leaders.get(session, ride.leader_id).await?;
        details.joined_rides.push(JoinedRideEntry {
            ride_id: ride.id,
            origin: ride.origin,
            destination: ride.destination,
            time: ride.time,
            price: ride.price,
            leader_name,
            joined_at: participant.joined_at,
        });
    }

    for request in session
        .requests_on(user.id, date, RequestStatus::Pending)
        .await?
    {
        let Some(ride) = session.ride_by_id(request.ride_id).await? else {
            continue;
        };
        let leader_name = leaders.get(session, ride.leader_id).await?;
        details.pending_requests.push(PendingRequestEntry {
            request_id: request.id,
            ride_id: ride.id,
            origin: ride.origin,
            destination: ride.destination,
            time: ride.time,
            price: ride.price,
            leader_name,
            requested_at: request.created_at,
        });
    }

    for request in session
        .requests_on(user.id, date, RequestStatus::Approved)
        .await?
    {
        let Some(ride) = session.ride_by_id(request.ride_id).await? else {
            continue;
        };
        let leader_name = leaders.get(session, ride.leader_id).await?;
        details.approved_privileges.push(approved_entry(
            &ride,
            request.id,
            request.updated_at,
            leader_name,
        ));
    }

    Ok(InvolvementReport::new(date, details))
}

fn approved_entry(
    ride: &Ride,
    request_id: Uuid,
    approved_at: DateTime<Utc>,
    leader_name: String,
) -> ApprovedPrivilegeEntry {
    ApprovedPrivilegeEntry {
        request_id,
        ride_id: ride.id,
        origin: ride.origin.clone(),
        destination: ride.destination.clone(),
        time: ride.time.clone(),
        price: ride.price,
        leader_name,
        approved_at,
        seats_available: ride.seats_available(),
        can_join: ride.has_free_seat(),
    }
}

impl RideService {
    /// Report everything `user` is involved in on `date` (`YYYY-MM-DD`)
    pub async fn check_involvement(
        &self,
        user: &User,
        date: &str,
    ) -> RideResult<InvolvementReport> {
        let date = parse_ride_date(date)?;
        let mut session = self.begin().await?;
        Ok(build_report(session.as_mut(), user, date).await?)
    }

    /// Delete the pending requests and approved privileges `user` holds for
    /// rides on `date`
    ///
    /// Posted and joined rides are left alone. Clearing twice is harmless.
    pub async fn clear_involvement(
        &self,
        user: &User,
        date: &str,
    ) -> RideResult<ClearedInvolvement> {
        let date = parse_ride_date(date)?;
        let mut session = self.begin().await?;

        let pending = session
            .requests_on(user.id, date, RequestStatus::Pending)
            .await?;
        let approved = session
            .requests_on(user.id, date, RequestStatus::Approved)
            .await?;

        let ids: Vec<Uuid> = pending
            .iter()
            .chain(approved.iter())
            .map(|r| r.id)
            .collect();
        if !ids.is_empty() {
            session.delete_requests(&ids).await?;
        }
        session.commit().await?;

        let cleared = ClearedInvolvement {
            cancelled_requests: pending.len(),
            cancelled_privileges: approved.len(),
            total_cancelled: ids.len(),
            date,
        };
        info!(
            "Cleared involvement for user {} on {}: {} requests, {} privileges",
            user.id, date, cleared.cancelled_requests, cleared.cancelled_privileges
        );

        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JoinRequest, Participant};
    use crate::store::{MemoryStore, Store};

    async fn seed_ride(store: &MemoryStore, leader: &User, date: NaiveDate, seats: i32) -> Ride {
        let now = Utc::now();
        let ride = Ride {
            id: Uuid::new_v4(),
            leader_id: leader.id,
            origin: "Hostel".to_string(),
            destination: "Station".to_string(),
            date,
            time: "08:30".to_string(),
            seats,
            seats_filled: 0,
            price: 4.0,
            created_at: now,
            updated_at: now,
        };
        let mut session = store.begin().await.unwrap();
        session.insert_ride(&ride).await.unwrap();
        session.commit().await.unwrap();
        ride
    }

    #[tokio::test]
    async fn test_report_collects_every_kind() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let alice = User::new("uid-alice", "Alice", None, now);
        let bob = User::new("uid-bob", "Bob", None, now);
        store.insert_user(alice.clone()).await;
        store.insert_user(bob.clone()).await;

        seed_ride(&store, &alice, date, 3).await;
        let joined = seed_ride(&store, &bob, date, 3).await;
        let requested = seed_ride(&store, &bob, date, 3).await;
        let approved = seed_ride(&store, &bob, date, 3).await;
        seed_ride(&store, &alice, date.succ_opt().unwrap(), 3).await;

        let mut session = store.begin().await.unwrap();
        session
            .insert_participant(&Participant {
                ride_id: joined.id,
                user_id: alice.id,
                joined_at: now,
            })
            .await
            .unwrap();
        session
            .insert_request(&JoinRequest::pending(requested.id, alice.id, now))
            .await
            .unwrap();
        let mut privilege = JoinRequest::pending(approved.id, alice.id, now);
        privilege.transition(RequestStatus::Approved, now).unwrap();
        session.insert_request(&privilege).await.unwrap();

        let report = build_report(session.as_mut(), &alice, date).await.unwrap();

        assert!(report.has_involvement);
        assert_eq!(
            report.summary,
            InvolvementSummary {
                posted_count: 1,
                joined_count: 1,
                pending_count: 1,
                approved_count: 1,
                total_count: 4,
            }
        );
        assert_eq!(report.details.joined_rides[0].leader_name, "Bob");
        assert!(report.details.approved_privileges[0].can_join);
        assert_eq!(report.details.approved_privileges[0].seats_available, 3);
    }

    #[tokio::test]
    async fn test_clear_involvement_on_empty_date() {
        let store = MemoryStore::new();
        let alice = User::new("uid-alice", "Alice", None, Utc::now());
        store.insert_user(alice.clone()).await;
        let service = RideService::from_store(store);

        let first = service.clear_involvement(&alice, "2025-06-10").await.unwrap();
        let second = service.clear_involvement(&alice, "2025-06-10").await.unwrap();

        assert_eq!(first.total_cancelled, 0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_check_involvement_rejects_bad_date() {
        let service = RideService::from_store(MemoryStore::new());
        let alice = User::new("uid-alice", "Alice", None, Utc::now());

        let err = service
            .check_involvement(&alice, "10-06-2025")
            .await
            .unwrap_err();

        assert!(matches!(err, crate::RideError::Validation(_)));
    }
}
