//! Join request state machine
//!
//! A request moves pending -> approved -> (consumed by joining) or to
//! revoked from either live state. A revoked request blocks resending for
//! [`REVOCATION_COOLDOWN_MINUTES`]; after that the stale row is deleted and
//! a fresh request may be sent.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConflictError, RideError, RideResult};
use crate::involvement::build_report;
use crate::models::{JoinRequest, NotificationKind, RequestStatus, User};
use crate::service::RideService;
use crate::store::StoreError;

/// Minutes a revoked request blocks resending to the same ride
pub const REVOCATION_COOLDOWN_MINUTES: i64 = 30;

/// Whole minutes of cooldown left, or `None` once it has elapsed
///
/// The count is rounded up, so 29 minutes after revocation two minutes
/// remain and the first instant at which resending is allowed is exactly
/// 30 minutes after revocation.
pub fn cooldown_remaining(revoked_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    let cooldown = Duration::minutes(REVOCATION_COOLDOWN_MINUTES);
    let elapsed = now - revoked_at;

    if elapsed >= cooldown {
        return None;
    }

    Some((cooldown - elapsed).num_minutes() + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownView {
    pub can_resend: bool,
    pub remaining_minutes: i64,
}

/// A request as seen by its sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentRequestView {
    pub request_id: Uuid,
    pub ride_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub time: String,
    pub price: f64,
    pub seats_available: i32,
    pub total_seats: i32,
    pub status: RequestStatus,
    pub leader_name: String,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub can_cancel: bool,
    pub can_join: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<CooldownView>,
}

/// A pending request as seen by the ride leader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingRequestView {
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub gender: Option<String>,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    Deny,
    Revoke,
}

impl Decision {
    fn target(self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Deny | Decision::Revoke => RequestStatus::Revoked,
        }
    }

    fn kind(self) -> NotificationKind {
        match self {
            Decision::Approve => NotificationKind::RequestApproved,
            Decision::Deny => NotificationKind::RequestDenied,
            Decision::Revoke => NotificationKind::RequestRevoked,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Decision::Approve => "Request Approved",
            Decision::Deny => "Request Denied",
            Decision::Revoke => "Request Revoked",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Deny => "denied",
            Decision::Revoke => "revoked",
        }
    }
}

impl RideService {
    /// Ask to join `ride_id`
    ///
    /// Refused when the sender leads a ride that day, already has a live
    /// request or a seat on this ride, is cooling down after a revocation,
    /// or is involved in anything else on that date. The leader is notified
    /// once the request is stored.
    pub async fn send_join_request(&self, user: &User, ride_id: Uuid) -> RideResult<JoinRequest> {
        let now = self.now();
        let mut session = self.begin().await?;

        let ride = session
            .ride_by_id(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;

        if !session.rides_led_by(user.id, Some(ride.date)).await?.is_empty() {
            return Err(ConflictError::LeaderSameDay { date: ride.date }.into());
        }

        if let Some(existing) = session.request_for(ride.id, user.id).await? {
            match existing.status {
                RequestStatus::Pending => return Err(ConflictError::AlreadyPending.into()),
                RequestStatus::Approved => return Err(ConflictError::AlreadyApproved.into()),
                RequestStatus::Revoked => {
                    let revoked_at = existing.revoked_at.unwrap_or(existing.updated_at);
                    if let Some(remaining_minutes) = cooldown_remaining(revoked_at, now) {
                        return Err(ConflictError::CooldownActive { remaining_minutes }.into());
                    }
                    debug!(
                        "Cooldown elapsed for request {}, removing revoked row",
                        existing.id
                    );
                    session.delete_requests(&[existing.id]).await?;
                }
            }
        }

        let report = build_report(session.as_mut(), user, ride.date).await?;
        if report
            .details
            .joined_rides
            .iter()
            .any(|joined| joined.ride_id == ride.id)
        {
            return Err(ConflictError::AlreadyJoined.into());
        }
        if report.has_involvement {
            return Err(ConflictError::InvolvementExists {
                date: ride.date,
                report: Box::new(report),
            }
            .into());
        }

        let request = JoinRequest::pending(ride.id, user.id, now);
        match session.insert_request(&request).await {
            Err(StoreError::UniqueViolation(_)) => {
                return Err(ConflictError::AlreadyPending.into());
            }
            other => other?,
        }

        let leader = session.user_by_id(ride.leader_id).await?;
        session.commit().await?;
        info!(
            "User {} requested to join ride {} (request {})",
            user.id, ride.id, request.id
        );

        if let Some(leader) = leader {
            let mut outbox = self.outbox();
            outbox.push(
                &leader.external_id,
                NotificationKind::JoinRequest,
                ride.id,
                "New Join Request",
                format!(
                    "{} has requested to join your ride {}",
                    user.name,
                    ride.itinerary()
                ),
            );
            self.dispatch(outbox).await;
        }

        Ok(request)
    }

    /// Withdraw the sender's pending request for `ride_id`
    pub async fn cancel_join_request(&self, user: &User, ride_id: Uuid) -> RideResult<()> {
        let mut session = self.begin().await?;

        let request = session
            .request_for(ride_id, user.id)
            .await?
            .filter(|r| r.status == RequestStatus::Pending)
            .ok_or_else(|| RideError::not_found("pending request"))?;

        session.delete_requests(&[request.id]).await?;
        session.commit().await?;
        info!("User {} cancelled request {}", user.id, request.id);

        Ok(())
    }

    /// Every request `user` has sent, newest first
    ///
    /// Requests whose ride or leader has disappeared are left out.
    pub async fn list_sent_requests(&self, user: &User) -> RideResult<Vec<SentRequestView>> {
        let now = self.now();
        let mut session = self.begin().await?;
        let mut views = Vec::new();

        for request in session.requests_by(user.id).await? {
            let Some(ride) = session.ride_by_id(request.ride_id).await? else {
                continue;
            };
            let Some(leader) = session.user_by_id(ride.leader_id).await? else {
                continue;
            };

            let cooldown = match request.status {
                RequestStatus::Revoked => {
                    let revoked_at = request.revoked_at.unwrap_or(request.updated_at);
                    Some(match cooldown_remaining(revoked_at, now) {
                        Some(remaining_minutes) => CooldownView {
                            can_resend: false,
                            remaining_minutes,
                        },
                        None => CooldownView {
                            can_resend: true,
                            remaining_minutes: 0,
                        },
                    })
                }
                _ => None,
            };

            views.push(SentRequestView {
                request_id: request.id,
                ride_id: ride.id,
                seats_available: ride.seats_available(),
                total_seats: ride.seats,
                can_cancel: request.status == RequestStatus::Pending,
                can_join: request.status == RequestStatus::Approved && ride.has_free_seat(),
                origin: ride.origin,
                destination: ride.destination,
                date: ride.date,
                time: ride.time,
                price: ride.price,
                status: request.status,
                leader_name: leader.name,
                requested_at: request.created_at,
                updated_at: request.updated_at,
                cooldown,
            });
        }

        Ok(views)
    }

    /// Pending requests for a ride, oldest first; leader only
    pub async fn list_pending_requests(
        &self,
        leader: &User,
        ride_id: Uuid,
    ) -> RideResult<Vec<PendingRequestView>> {
        let mut session = self.begin().await?;

        let ride = session
            .ride_by_id(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;
        if ride.leader_id != leader.id {
            return Err(RideError::Forbidden(
                "You are not the leader of this ride".to_string(),
            ));
        }

        let mut views = Vec::new();
        for request in session
            .requests_for_ride(ride.id, RequestStatus::Pending)
            .await?
        {
            let Some(requester) = session.user_by_id(request.user_id).await? else {
                continue;
            };
            views.push(PendingRequestView {
                request_id: request.id,
                user_id: requester.id,
                name: requester.name,
                gender: requester.gender,
                status: request.status,
                requested_at: request.created_at,
            });
        }

        Ok(views)
    }

    /// Grant the requester the privilege to join; the ride must have a free seat
    pub async fn approve_request(
        &self,
        leader: &User,
        request_id: Uuid,
    ) -> RideResult<JoinRequest> {
        self.decide(leader, request_id, Decision::Approve).await
    }

    /// Turn down a pending request
    pub async fn deny_request(
        &self,
        leader: &User,
        request_id: Uuid,
    ) -> RideResult<JoinRequest> {
        self.decide(leader, request_id, Decision::Deny).await
    }

    /// Withdraw a pending request or an approved privilege
    pub async fn revoke_request(
        &self,
        leader: &User,
        request_id: Uuid,
    ) -> RideResult<JoinRequest> {
        self.decide(leader, request_id, Decision::Revoke).await
    }

    async fn decide(
        &self,
        leader: &User,
        request_id: Uuid,
        decision: Decision,
    ) -> RideResult<JoinRequest> {
        let now = self.now();
        let mut session = self.begin().await?;

        let mut request = session
            .request_by_id(request_id)
            .await?
            .ok_or_else(|| RideError::not_found("request"))?;
        let ride = session
            .lock_ride(request.ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride"))?;

        if ride.leader_id != leader.id {
            return Err(RideError::Forbidden(
                "You are not the leader of this ride".to_string(),
            ));
        }

        let target = decision.target();
        if decision == Decision::Deny && request.status != RequestStatus::Pending {
            return Err(ConflictError::InvalidTransition {
                from: request.status,
                to: target,
            }
            .into());
        }
        if decision == Decision::Approve
            && request.status == RequestStatus::Pending
            && !ride.has_free_seat()
        {
            return Err(ConflictError::RideFull.into());
        }

        request
            .transition(target, now)
            .map_err(|from| ConflictError::InvalidTransition { from, to: target })?;
        session.update_request(&request).await?;

        let requester = session.user_by_id(request.user_id).await?;
        session.commit().await?;
        info!(
            "Request {} for ride {} {} by leader {}",
            request.id,
            ride.id,
            decision.verb(),
            leader.id
        );

        if let Some(requester) = requester {
            let mut outbox = self.outbox();
            outbox.push(
                &requester.external_id,
                decision.kind(),
                ride.id,
                decision.title(),
                format!(
                    "Your request to join the ride {} has been {} by {}",
                    ride.itinerary(),
                    decision.verb(),
                    leader.name
                ),
            );
            self.dispatch(outbox).await;
        }

        Ok(request)
    }
}
