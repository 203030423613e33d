//! PostgreSQL implementation of the store-session abstraction

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, Transaction, migrate::Migrator};
use tracing::info;
use uuid::Uuid;

use super::{NotificationSink, Store, StoreResult, StoreSession};
use crate::models::{JoinRequest, Notification, Participant, RequestStatus, Ride, User};

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const RIDE_COLUMNS: &str = "id, leader_id, origin, destination, ride_date, ride_time, seats, \
                            seats_filled, price, created_at, updated_at";

const REQUEST_COLUMNS: &str =
    "q.id, q.ride_id, q.user_id, q.status, q.revoked_at, q.created_at, q.updated_at";

const NOTIFICATION_COLUMNS: &str =
    "id, recipient, title, message, kind, ride_id, is_read, created_at, updated_at";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an initialised pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(DatabaseError::Migration)?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreSession>> {
        let mut tx = self.pool.begin().await?;

        // Check-then-act sequences span several rows (involvement across
        // rides of one date), so row locks alone are not enough.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgSession { tx }))
    }
}

#[async_trait]
impl NotificationSink for PgStore {
    async fn append(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, recipient, title, message, kind, ride_id, is_read, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.recipient)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.kind)
        .bind(notification.ride_id)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// One serializable PostgreSQL transaction
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn user_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, external_id, name, gender, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn user_by_external_id(&mut self, external_id: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, external_id, name, gender, created_at, updated_at
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn insert_ride(&mut self, ride: &Ride) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rides
                (id, leader_id, origin, destination, ride_date, ride_time, seats,
                 seats_filled, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(ride.id)
        .bind(ride.leader_id)
        .bind(&ride.origin)
        .bind(&ride.destination)
        .bind(ride.date)
        .bind(&ride.time)
        .bind(ride.seats)
        .bind(ride.seats_filled)
        .bind(ride.price)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn ride_by_id(&mut self, id: Uuid) -> StoreResult<Option<Ride>> {
        let sql = format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1");
        let ride = sqlx::query_as::<_, Ride>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(ride)
    }

    async fn lock_ride(&mut self, id: Uuid) -> StoreResult<Option<Ride>> {
        let sql = format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1 FOR UPDATE");
        let ride = sqlx::query_as::<_, Ride>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(ride)
    }

    async fn rides_led_by(
        &mut self,
        leader_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Ride>> {
        let sql = format!(
            "SELECT {RIDE_COLUMNS} FROM rides \
             WHERE leader_id = $1 AND ($2::date IS NULL OR ride_date = $2) \
             ORDER BY ride_date, ride_time"
        );
        let rides = sqlx::query_as::<_, Ride>(&sql)
            .bind(leader_id)
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rides)
    }

    async fn rides_by_ids(&mut self, ids: &[Uuid]) -> StoreResult<Vec<Ride>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE id = ANY($1) ORDER BY ride_date, ride_time"
        );
        let rides = sqlx::query_as::<_, Ride>(&sql)
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rides)
    }

    async fn find_rides(
        &mut self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Ride>> {
        let sql = format!(
            "SELECT {RIDE_COLUMNS} FROM rides \
             WHERE origin = $1 AND destination = $2 AND ride_date = $3 \
             ORDER BY ride_time"
        );
        let rides = sqlx::query_as::<_, Ride>(&sql)
            .bind(origin)
            .bind(destination)
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rides)
    }

    async fn rides_before(&mut self, date: NaiveDate) -> StoreResult<Vec<Ride>> {
        let sql = format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE ride_date < $1 ORDER BY ride_date, ride_time"
        );
        let rides = sqlx::query_as::<_, Ride>(&sql)
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rides)
    }

    async fn set_seats_filled(
        &mut self,
        ride_id: Uuid,
        seats_filled: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE rides SET seats_filled = $1, updated_at = $2 WHERE id = $3")
            .bind(seats_filled)
            .bind(now)
            .bind(ride_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_ride(&mut self, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM rides WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn participants_of(&mut self, ride_id: Uuid) -> StoreResult<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(
            r#"
            SELECT ride_id, user_id, joined_at
            FROM participants
            WHERE ride_id = $1
            ORDER BY joined_at
            "#,
        )
        .bind(ride_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(participants)
    }

    async fn participations_of(
        &mut self,
        user_id: Uuid,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Participant>> {
        let participants = sqlx::query_as::<_, Participant>(
            r#"
            SELECT p.ride_id, p.user_id, p.joined_at
            FROM participants p
            JOIN rides r ON r.id = p.ride_id
            WHERE p.user_id = $1 AND ($2::date IS NULL OR r.ride_date = $2)
            ORDER BY p.joined_at DESC
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(participants)
    }

    async fn insert_participant(&mut self, participant: &Participant) -> StoreResult<()> {
        sqlx::query("INSERT INTO participants (ride_id, user_id, joined_at) VALUES ($1, $2, $3)")
            .bind(participant.ride_id)
            .bind(participant.user_id)
            .bind(participant.joined_at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_participant(&mut self, ride_id: Uuid, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM participants WHERE ride_id = $1 AND user_id = $2")
            .bind(ride_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_participants_of(&mut self, ride_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM participants WHERE ride_id = $1")
            .bind(ride_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn request_by_id(&mut self, id: Uuid) -> StoreResult<Option<JoinRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests q WHERE q.id = $1");
        let request = sqlx::query_as::<_, JoinRequest>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(request)
    }

    async fn request_for(
        &mut self,
        ride_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<JoinRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests q WHERE q.ride_id = $1 AND q.user_id = $2"
        );
        let request = sqlx::query_as::<_, JoinRequest>(&sql)
            .bind(ride_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(request)
    }

    async fn requests_by(&mut self, user_id: Uuid) -> StoreResult<Vec<JoinRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests q WHERE q.user_id = $1 \
             ORDER BY q.created_at DESC"
        );
        let requests = sqlx::query_as::<_, JoinRequest>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(requests)
    }

    async fn requests_on(
        &mut self,
        user_id: Uuid,
        date: NaiveDate,
        status: RequestStatus,
    ) -> StoreResult<Vec<JoinRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests q \
             JOIN rides r ON r.id = q.ride_id \
             WHERE q.user_id = $1 AND q.status = $2 AND r.ride_date = $3 \
             ORDER BY q.created_at"
        );
        let requests = sqlx::query_as::<_, JoinRequest>(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(requests)
    }

    async fn requests_for_ride(
        &mut self,
        ride_id: Uuid,
        status: RequestStatus,
    ) -> StoreResult<Vec<JoinRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests q \
             WHERE q.ride_id = $1 AND q.status = $2 \
             ORDER BY q.created_at"
        );
        let requests = sqlx::query_as::<_, JoinRequest>(&sql)
            .bind(ride_id)
            .bind(status.as_str())
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(requests)
    }

    async fn insert_request(&mut self, request: &JoinRequest) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO requests (id, ride_id, user_id, status, revoked_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(request.id)
        .bind(request.ride_id)
        .bind(request.user_id)
        .bind(request.status.as_str())
        .bind(request.revoked_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_request(&mut self, request: &JoinRequest) -> StoreResult<()> {
        sqlx::query(
            "UPDATE requests SET status = $1, revoked_at = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(request.status.as_str())
        .bind(request.revoked_at)
        .bind(request.updated_at)
        .bind(request.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_requests(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM requests WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_requests_of(&mut self, ride_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM requests WHERE ride_id = $1")
            .bind(ride_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn notifications_for(&mut self, recipient: &str) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient = $1 \
             ORDER BY created_at DESC"
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(recipient)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(notifications)
    }

    async fn mark_notification_read(
        &mut self,
        id: Uuid,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, updated_at = $1 \
             WHERE id = $2 AND recipient = $3",
        )
        .bind(now)
        .bind(id)
        .bind(recipient)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_all_read(&mut self, recipient: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, updated_at = $1 \
             WHERE recipient = $2 AND is_read = FALSE",
        )
        .bind(now)
        .bind(recipient)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&mut self, recipient: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient = $1 AND is_read = FALSE",
        )
        .bind(recipient)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn delete_notifications_of(&mut self, ride_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE ride_id = $1")
            .bind(ride_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
