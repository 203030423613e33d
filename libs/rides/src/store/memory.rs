//! In-memory store for tests and local runs.
//!
//! A session takes the state lock for its whole lifetime and works on a copy,
//! so sessions are fully serialized and a dropped session leaves no trace.
//! Faults can be injected at named cascade steps and per notification
//! recipient to exercise rollback and best-effort delivery.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{NotificationSink, Store, StoreError, StoreResult, StoreSession};
use crate::models::{JoinRequest, Notification, Participant, RequestStatus, Ride, User};

/// Steps at which a session can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    DeleteNotifications,
    DeleteParticipants,
    DeleteRequests,
    DeleteRide,
    Commit,
}

#[derive(Debug, Default)]
struct Faults {
    steps: HashSet<FailPoint>,
    recipients: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    rides: HashMap<Uuid, Ride>,
    participants: Vec<Participant>,
    requests: HashMap<Uuid, JoinRequest>,
    notifications: Vec<Notification>,
}

/// Store keeping every table in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user in the directory
    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Make every session fail when it reaches `step`
    pub fn fail_at(&self, step: FailPoint) {
        self.faults().steps.insert(step);
    }

    /// Make notification delivery to `recipient` fail
    pub fn fail_delivery_to(&self, recipient: impl Into<String>) {
        self.faults().recipients.insert(recipient.into());
    }

    pub fn clear_faults(&self) {
        let mut faults = self.faults();
        faults.steps.clear();
        faults.recipients.clear();
    }

    pub async fn rides(&self) -> Vec<Ride> {
        let mut rides: Vec<Ride> = self.state.lock().await.rides.values().cloned().collect();
        rides.sort_by_key(|r| (r.date, r.time.clone(), r.created_at));
        rides
    }

    pub async fn requests(&self) -> Vec<JoinRequest> {
        let mut requests: Vec<JoinRequest> =
            self.state.lock().await.requests.values().cloned().collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    pub async fn participants(&self) -> Vec<Participant> {
        self.state.lock().await.participants.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreSession>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(MemorySession {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn append(&self, notification: &Notification) -> StoreResult<()> {
        if self.faults().recipients.contains(&notification.recipient) {
            return Err(StoreError::Injected(format!(
                "notification to {}",
                notification.recipient
            )));
        }

        self.state
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }
}

/// Exclusive session over a working copy of the state
pub struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<StdMutex<Faults>>,
}

impl MemorySession {
    fn check(&self, step: FailPoint) -> StoreResult<()> {
        let faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if faults.steps.contains(&step) {
            return Err(StoreError::Injected(format!("{:?}", step)));
        }
        Ok(())
    }

    fn ride_date(&self, ride_id: Uuid) -> Option<NaiveDate> {
        self.working.rides.get(&ride_id).map(|r| r.date)
    }

    fn sorted_rides<'a>(rides: impl Iterator<Item = &'a Ride>) -> Vec<Ride> {
        let mut rides: Vec<Ride> = rides.cloned().collect();
        rides.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        rides
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn user_by_external_id(&mut self, external_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn insert_ride(&mut self, ride: &Ride) -> StoreResult<()> {
        if self.working.rides.contains_key(&ride.id) {
            return Err(StoreError::UniqueViolation("rides_pkey".to_string()));
        }
        self.working.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn ride_by_id(&mut self, id: Uuid) -> StoreResult<Option<Ride>> {
        Ok(self.working.rides.get(&id).cloned())
    }

    async fn lock_ride(&mut self, id: Uuid) -> StoreResult<Option<Ride>> {
        // The session already holds the whole state exclusively.
        Ok(self.working.rides.get(&id).cloned())
    }

    async fn rides_led_by(
        &mut self,
        leader_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Ride>> {
        Ok(Self::sorted_rides(self.working.rides.values().filter(|r| {
            r.leader_id == leader_id && date.is_none_or(|d| r.date == d)
        })))
    }

    async fn rides_by_ids(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Ride>> {
        Ok(Self::sorted_rides(
            ids.iter().filter_map(|id| self.working.rides.get(id)),
        ))
    }

    async fn find_rides(
        &mut self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Ride>> {
        Ok(Self::sorted_rides(self.working.rides.values().filter(|r| {
            r.origin == origin && r.destination == destination && r.date == date
        })))
    }

    async fn rides_before(&mut self, date: NaiveDate) -> StoreResult<Vec<Ride>> {
        Ok(Self::sorted_rides(
            self.working.rides.values().filter(|r| r.date < date),
        ))
    }

    async fn set_seats_filled(
        &mut self,
        ride_id: Uuid,
        seats_filled: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(ride) = self.working.rides.get_mut(&ride_id) {
            ride.seats_filled = seats_filled;
            ride.updated_at = now;
        }
        Ok(())
    }

    async fn delete_ride(&mut self, id: Uuid) -> StoreResult<u64> {
        self.check(FailPoint::DeleteRide)?;
        Ok(self.working.rides.remove(&id).map_or(0, |_| 1))
    }

    async fn participants_of(&mut self, ride_id: Uuid) -> StoreResult<Vec<Participant>> {
        let mut participants: Vec<Participant> = self
            .working
            .participants
            .iter()
            .filter(|p| p.ride_id == ride_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.joined_at);
        Ok(participants)
    }

    async fn participations_of(
        &mut self,
        user_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Participant>> {
        let mut participants: Vec<Participant> = self
            .working
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter(|p| match (date, self.ride_date(p.ride_id)) {
                (None, Some(_)) => true,
                (Some(wanted), Some(actual)) => wanted == actual,
                (_, None) => false,
            })
            .cloned()
            .collect();
        participants.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(participants)
    }

    async fn insert_participant(&mut self, participant: &Participant) -> StoreResult<()> {
        let exists = self
            .working
            .participants
            .iter()
            .any(|p| p.ride_id == participant.ride_id && p.user_id == participant.user_id);
        if exists {
            return Err(StoreError::UniqueViolation("participants_pkey".to_string()));
        }
        self.working.participants.push(participant.clone());
        Ok(())
    }

    async fn delete_participant(&mut self, ride_id: Uuid, user_id: Uuid) -> StoreResult<u64> {
        let before = self.working.participants.len();
        self.working
            .participants
            .retain(|p| !(p.ride_id == ride_id && p.user_id == user_id));
        Ok((before - self.working.participants.len()) as u64)
    }

    async fn delete_participants_of(&mut self, ride_id: Uuid) -> StoreResult<u64> {
        self.check(FailPoint::DeleteParticipants)?;
        let before = self.working.participants.len();
        self.working.participants.retain(|p| p.ride_id != ride_id);
        Ok((before - self.working.participants.len()) as u64)
    }

    async fn request_by_id(&mut self, id: Uuid) -> StoreResult<Option<JoinRequest>> {
        Ok(self.working.requests.get(&id).cloned())
    }

    async fn request_for(
        &mut self,
        ride_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<JoinRequest>> {
        Ok(self
            .working
            .requests
            .values()
            .find(|r| r.ride_id == ride_id && r.user_id == user_id)
            .cloned())
    }

    async fn requests_by(&mut self, user_id: Uuid) -> StoreResult<Vec<JoinRequest>> {
        let mut requests: Vec<JoinRequest> = self
            .working
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn requests_on(
        &mut self,
        user_id: Uuid,
        date: NaiveDate,
        status: RequestStatus,
    ) -> StoreResult<Vec<JoinRequest>> {
        let mut requests: Vec<JoinRequest> = self
            .working
            .requests
            .values()
            .filter(|r| r.user_id == user_id && r.status == status)
            .filter(|r| self.ride_date(r.ride_id) == Some(date))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn requests_for_ride(
        &mut self,
        ride_id: Uuid,
        status: RequestStatus,
    ) -> StoreResult<Vec<JoinRequest>> {
        let mut requests: Vec<JoinRequest> = self
            .working
            .requests
            .values()
            .filter(|r| r.ride_id == ride_id && r.status == status)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn insert_request(&mut self, request: &JoinRequest) -> StoreResult<()> {
        let duplicate = self
            .working
            .requests
            .values()
            .any(|r| r.ride_id == request.ride_id && r.user_id == request.user_id);
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "requests_ride_user_key".to_string(),
            ));
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_request(&mut self, request: &JoinRequest) -> StoreResult<()> {
        if let Some(existing) = self.working.requests.get_mut(&request.id) {
            existing.status = request.status;
            existing.revoked_at = request.revoked_at;
            existing.updated_at = request.updated_at;
        }
        Ok(())
    }

    async fn delete_requests(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        let removed = ids
            .iter()
            .filter(|id| self.working.requests.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn delete_requests_of(&mut self, ride_id: Uuid) -> StoreResult<u64> {
        self.check(FailPoint::DeleteRequests)?;
        let before = self.working.requests.len();
        self.working.requests.retain(|_, r| r.ride_id != ride_id);
        Ok((before - self.working.requests.len()) as u64)
    }

    async fn notifications_for(&mut self, recipient: &str) -> StoreResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .working
            .notifications
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(
        &mut self,
        id: Uuid,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut updated = 0;
        for notification in self
            .working
            .notifications
            .iter_mut()
            .filter(|n| n.id == id && n.recipient == recipient)
        {
            notification.is_read = true;
            notification.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn mark_all_read(&mut self, recipient: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut updated = 0;
        for notification in self
            .working
            .notifications
            .iter_mut()
            .filter(|n| n.recipient == recipient && !n.is_read)
        {
            notification.is_read = true;
            notification.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn unread_count(&mut self, recipient: &str) -> StoreResult<i64> {
        Ok(self
            .working
            .notifications
            .iter()
            .filter(|n| n.recipient == recipient && !n.is_read)
            .count() as i64)
    }

    async fn delete_notifications_of(&mut self, ride_id: Uuid) -> StoreResult<u64> {
        self.check(FailPoint::DeleteNotifications)?;
        let before = self.working.notifications.len();
        self.working.notifications.retain(|n| n.ride_id != ride_id);
        Ok((before - self.working.notifications.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.check(FailPoint::Commit)?;
        let MemorySession {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
