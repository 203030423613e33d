//! Ride-sharing domain models

pub mod notification;
pub mod request;
pub mod ride;
pub mod user;

// Re-export for convenience
pub use notification::{Notification, NotificationKind};
pub use request::{JoinRequest, RequestStatus, UnknownStatus};
pub use ride::{NewRide, Participant, Ride};
pub use user::User;
