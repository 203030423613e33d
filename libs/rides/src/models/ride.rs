//! Ride and participant models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ride entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ride {
    pub id: Uuid,
    pub leader_id: Uuid,
    pub origin: String,
    pub destination: String,
    /// Calendar day of the ride, rendered as `YYYY-MM-DD`
    #[sqlx(rename = "ride_date")]
    pub date: NaiveDate,
    /// Departure time as 24-hour `HH:MM`
    #[sqlx(rename = "ride_time")]
    pub time: String,
    pub seats: i32,
    pub seats_filled: i32,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn seats_available(&self) -> i32 {
        self.seats - self.seats_filled
    }

    pub fn has_free_seat(&self) -> bool {
        self.seats_filled < self.seats
    }

    /// `origin to destination on date at time`, used in notification texts
    pub fn itinerary(&self) -> String {
        format!(
            "from {} to {} on {} at {}",
            self.origin, self.destination, self.date, self.time
        )
    }
}

/// New ride creation payload
///
/// Date and time arrive as lexical strings and are validated before a
/// [`Ride`] is built from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRide {
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub time: String,
    pub seats: i32,
    pub price: f64,
}

/// Seat occupied by a user on a ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub ride_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}
