//! Error taxonomy for ride, request and involvement operations

use chrono::NaiveDate;
use thiserror::Error;

use crate::involvement::InvolvementReport;
use crate::models::RequestStatus;
use crate::store::StoreError;

/// Errors reported by [`RideService`](crate::RideService) operations
///
/// Every variant except `Transaction` leaves the store unchanged.
/// `Transaction` means the whole operation was rolled back and may be retried.
#[derive(Error, Debug)]
pub enum RideError {
    /// Malformed date, time, identifier or payload
    #[error("{0}")]
    Validation(String),

    /// Missing user, ride, request or notification
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is not allowed to act on the entity
    #[error("{0}")]
    Forbidden(String),

    /// The operation would break a lifecycle rule
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Store failure; the transaction was rolled back
    #[error("Store operation failed: {0}")]
    Transaction(#[from] StoreError),
}

impl RideError {
    pub(crate) fn not_found(entity: &str) -> Self {
        let mut name = entity.to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        RideError::NotFound(name)
    }
}

/// Conflicts carry enough detail for the caller to remediate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConflictError {
    #[error("You are already involved in rides for {date}. Please clear your involvement first.")]
    InvolvementExists {
        date: NaiveDate,
        report: Box<InvolvementReport>,
    },

    #[error(
        "You cannot send a join request and create a ride on the same day. You have already created a ride for {date}"
    )]
    LeaderSameDay { date: NaiveDate },

    #[error("Request already pending")]
    AlreadyPending,

    #[error("Already approved for this ride")]
    AlreadyApproved,

    #[error("Already a participant of this ride")]
    AlreadyJoined,

    #[error("Request was revoked. Please wait {remaining_minutes} more minutes before resending.")]
    CooldownActive { remaining_minutes: i64 },

    #[error("No seats left on this ride")]
    RideFull,

    #[error("Request is {from} and cannot become {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
}

/// Type alias for Result with RideError
pub type RideResult<T> = Result<T, RideError>;
