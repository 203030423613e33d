//! Expiry sweep
//!
//! Deletes every ride dated before today, one transaction per ride, and
//! tells the participants and the leader that the ride is complete.
//! Notifications about swept rides are kept as history.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::RideResult;
use crate::lifecycle::{cascade_delete, participant_recipients};
use crate::models::NotificationKind;
use crate::outbox::Delivery;
use crate::service::RideService;

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub found: usize,
    pub deleted: usize,
    pub failed: usize,
    pub notifications_sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was still running
    Skipped,
}

/// Runs the expiry sweep, never more than one at a time
#[derive(Clone)]
pub struct ExpirySweeper {
    service: RideService,
    running: Arc<Mutex<()>>,
}

impl ExpirySweeper {
    pub fn new(service: RideService) -> Self {
        Self {
            service,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Sweep rides dated strictly before the clock's current day
    ///
    /// A ride that fails to delete is logged and counted; the sweep moves on
    /// to the next one. Only listing the expired rides can fail the run.
    pub async fn run(&self) -> RideResult<SweepOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Expiry sweep already running, skipping this trigger");
            return Ok(SweepOutcome::Skipped);
        };

        let today = self.service.today();
        info!("Starting cleanup of rides dated before {}", today);

        let expired = {
            let mut session = self.service.begin().await?;
            session.rides_before(today).await?
        };

        let mut report = SweepReport {
            found: expired.len(),
            ..SweepReport::default()
        };
        if expired.is_empty() {
            info!("No expired rides found");
            return Ok(SweepOutcome::Completed(report));
        }
        info!("Found {} expired rides to clean up", expired.len());

        for ride in &expired {
            match self.expire(ride.id, today).await {
                Ok(Some(delivery)) => {
                    report.deleted += 1;
                    report.notifications_sent += delivery.delivered;
                }
                Ok(None) => {
                    info!("Ride {} no longer expired or already gone, skipping", ride.id);
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to delete expired ride {}: {}", ride.id, e);
                }
            }
        }

        info!(
            "Cleanup completed: {} expired rides deleted (out of {} found), {} failed",
            report.deleted, report.found, report.failed
        );
        Ok(SweepOutcome::Completed(report))
    }

    async fn expire(&self, ride_id: Uuid, today: NaiveDate) -> RideResult<Option<Delivery>> {
        let mut session = self.service.begin().await?;

        let Some(ride) = session.lock_ride(ride_id).await? else {
            return Ok(None);
        };
        if ride.date >= today {
            return Ok(None);
        }

        let participants = session.participants_of(ride.id).await?;
        let recipients = participant_recipients(session.as_mut(), &participants).await?;
        let leader = session.user_by_id(ride.leader_id).await?;

        cascade_delete(session.as_mut(), ride.id, false).await?;
        session.commit().await?;

        let leader_name = leader
            .as_ref()
            .map(|l| l.name.as_str())
            .unwrap_or("Unknown");
        let route = ride.itinerary();

        let mut outbox = self.service.outbox();
        for recipient in &recipients {
            outbox.push(
                recipient,
                NotificationKind::RideCompleted,
                ride.id,
                "Ride Completed",
                format!(
                    "Your ride {} with leader {} has been completed. Total participants: {}",
                    route,
                    leader_name,
                    participants.len()
                ),
            );
        }
        if let Some(leader) = &leader {
            outbox.push(
                &leader.external_id,
                NotificationKind::RideCompleted,
                ride.id,
                "Ride Completed",
                format!(
                    "Your ride {} has been completed. Total participants: {}",
                    route,
                    participants.len()
                ),
            );
        }

        let delivery = self.service.dispatch(outbox).await;
        info!(
            "Deleted expired ride {} and notified {} of {} recipients",
            ride.id, delivery.delivered, delivery.attempted
        );
        Ok(Some(delivery))
    }
}
