//! Store-session abstraction over the relational store
//!
//! Every operation opens one [`StoreSession`] through [`Store::begin`]; all of
//! its reads and writes go through that session and become visible together
//! on [`StoreSession::commit`]. Dropping a session without committing rolls
//! it back. Notifications are written through [`NotificationSink`], outside
//! any session, so their failure can never unwind a committed mutation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{JoinRequest, Notification, Participant, RequestStatus, Ride, User};

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::{MIGRATOR, PgStore};

/// Errors raised by store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Query or connection failure
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A unique constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Concurrent transactions conflicted; the caller should retry
    #[error("transaction could not be serialized, retry the operation")]
    Serialization,

    /// Fault injected by the in-memory store
    #[error("injected failure at {0}")]
    Injected(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return StoreError::UniqueViolation(
                        db_err.constraint().unwrap_or("unknown").to_string(),
                    );
                }
                Some("40001") | Some("40P01") => return StoreError::Serialization,
                _ => {}
            }
        }
        StoreError::Query(err)
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

/// Factory for transactional sessions
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new transaction
    async fn begin(&self) -> StoreResult<Box<dyn StoreSession>>;
}

/// Durable mailbox keyed by recipient
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Append a notification; never called while a session is open
    async fn append(&self, notification: &Notification) -> StoreResult<()>;
}

/// One transaction against the store
#[async_trait]
pub trait StoreSession: Send {
    // -- user directory --

    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>>;

    async fn user_by_external_id(&mut self, external_id: &str) -> StoreResult<Option<User>>;

    // -- rides --

    async fn insert_ride(&mut self, ride: &Ride) -> StoreResult<()>;

    async fn ride_by_id(&mut self, id: Uuid) -> StoreResult<Option<Ride>>;

    /// Read a ride and hold a row lock on it until the session ends
    async fn lock_ride(&mut self, id: Uuid) -> StoreResult<Option<Ride>>;

    /// Rides led by `leader_id`, optionally restricted to one date
    async fn rides_led_by(
        &mut self,
        leader_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Ride>>;

    async fn rides_by_ids(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Ride>>;

    async fn find_rides(
        &mut self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Ride>>;

    /// Rides dated strictly before `date`
    async fn rides_before(&mut self, date: NaiveDate) -> StoreResult<Vec<Ride>>;

    async fn set_seats_filled(
        &mut self,
        ride_id: Uuid,
        seats_filled: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn delete_ride(&mut self, id: Uuid) -> StoreResult<u64>;

    // -- participants --

    async fn participants_of(&mut self, ride_id: Uuid) -> StoreResult<Vec<Participant>>;

    /// Seats held by `user_id`, optionally restricted to rides on one date
    async fn participations_of(
        &mut self,
        user_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Participant>>;

    async fn insert_participant(&mut self, participant: &Participant) -> StoreResult<()>;

    async fn delete_participant(&mut self, ride_id: Uuid, user_id: Uuid) -> StoreResult<u64>;

    async fn delete_participants_of(&mut self, ride_id: Uuid) -> StoreResult<u64>;

    // -- requests --

    async fn request_by_id(&mut self, id: Uuid) -> StoreResult<Option<JoinRequest>>;

    async fn request_for(&mut self, ride_id: Uuid, user_id: Uuid)
    -> StoreResult<Option<JoinRequest>>;

    /// Requests sent by `user_id`, newest first
    async fn requests_by(&mut self, user_id: Uuid) -> StoreResult<Vec<JoinRequest>>;

    /// Requests of `user_id` in `status` for rides dated `date`
    async fn requests_on(
        &mut self,
        user_id: Uuid,
        date: NaiveDate,
        status: RequestStatus,
    ) -> StoreResult<Vec<JoinRequest>>;

    /// Requests for `ride_id` in `status`, oldest first
    async fn requests_for_ride(
        &mut self,
        ride_id: Uuid,
        status: RequestStatus,
    ) -> StoreResult<Vec<JoinRequest>>;

    async fn insert_request(&mut self, request: &JoinRequest) -> StoreResult<()>;

    /// Persist status, revoked-at and updated-at of an existing request
    async fn update_request(&mut self, request: &JoinRequest) -> StoreResult<()>;

    /// Bulk delete by id list
    async fn delete_requests(&mut self, ids: &[Uuid]) -> StoreResult<u64>;

    async fn delete_requests_of(&mut self, ride_id: Uuid) -> StoreResult<u64>;

    // -- notifications --

    /// Notifications addressed to `recipient`, newest first
    async fn notifications_for(&mut self, recipient: &str) -> StoreResult<Vec<Notification>>;

    async fn mark_notification_read(
        &mut self,
        id: Uuid,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn mark_all_read(&mut self, recipient: &str, now: DateTime<Utc>) -> StoreResult<u64>;

    async fn unread_count(&mut self, recipient: &str) -> StoreResult<i64>;

    async fn delete_notifications_of(&mut self, ride_id: Uuid) -> StoreResult<u64>;

    /// Publish every write made through this session
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
