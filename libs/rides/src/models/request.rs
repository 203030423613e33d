//! Join request model and its status transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a join request
///
/// A revoked request is deleted once its cooldown lapses, which returns the
/// (ride, user) pair to the "no request" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Revoked,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Revoked => "revoked",
        }
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_become(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Revoked)
                | (RequestStatus::Approved, RequestStatus::Revoked)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored status is not one of the known values
#[derive(Debug, Error, Clone, PartialEq)]
#[error("unknown request status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "revoked" => Ok(RequestStatus::Revoked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for RequestStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Join request entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JoinRequest {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    /// Set only while `status` is revoked
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JoinRequest {
    /// A fresh pending request
    pub fn pending(ride_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id,
            user_id,
            status: RequestStatus::Pending,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, stamping `updated_at` (and `revoked_at` on revocation).
    ///
    /// Returns the rejected source state when the transition is illegal.
    pub fn transition(
        &mut self,
        next: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<(), RequestStatus> {
        if !self.status.can_become(next) {
            return Err(self.status);
        }

        self.status = next;
        self.updated_at = now;
        self.revoked_at = match next {
            RequestStatus::Revoked => Some(now),
            _ => None,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_exact() {
        assert_eq!("pending".parse::<RequestStatus>(), Ok(RequestStatus::Pending));
        assert_eq!("approved".parse::<RequestStatus>(), Ok(RequestStatus::Approved));
        assert!("PENDING".parse::<RequestStatus>().is_err());
        assert!("pre-approved".parse::<RequestStatus>().is_err());
        assert!("not_revoked".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_transition_rules() {
        let now = Utc::now();
        let mut request = JoinRequest::pending(Uuid::new_v4(), Uuid::new_v4(), now);

        request.transition(RequestStatus::Approved, now).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.revoked_at.is_none());

        assert_eq!(
            request.transition(RequestStatus::Pending, now),
            Err(RequestStatus::Approved)
        );

        request.transition(RequestStatus::Revoked, now).unwrap();
        assert_eq!(request.revoked_at, Some(now));

        assert_eq!(
            request.transition(RequestStatus::Approved, now),
            Err(RequestStatus::Revoked)
        );
    }
}
