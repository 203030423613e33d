//! Cron-driven expiry sweeps

use anyhow::Result;
use rides::{ExpirySweeper, SweepOutcome};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

#[derive(Clone)]
pub struct ExpiryScheduler {
    sweeper: ExpirySweeper,
}

impl ExpiryScheduler {
    pub fn new(sweeper: ExpirySweeper) -> Self {
        Self { sweeper }
    }

    /// Run one sweep and log its outcome
    pub async fn run_once(&self) -> Option<SweepOutcome> {
        match self.sweeper.run().await {
            Ok(outcome) => {
                if let SweepOutcome::Completed(report) = &outcome {
                    info!(
                        "Expiry sweep finished: {} found, {} deleted, {} failed, {} notifications sent",
                        report.found, report.deleted, report.failed, report.notifications_sent
                    );
                }
                Some(outcome)
            }
            Err(e) => {
                error!("Failed to list expired rides: {}", e);
                None
            }
        }
    }

    /// Register the sweep on `schedule` and start the scheduler
    ///
    /// The returned scheduler keeps running until it is shut down.
    pub async fn start(&self, schedule: &str) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;
        let job = self.job(schedule)?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started expiry sweep scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }

    fn job(&self, schedule: &str) -> Result<Job> {
        let this = self.clone();

        let job = Job::new_async(schedule, move |_, _| {
            let this = this.clone();
            Box::pin(async move {
                info!("Expiry sweep job executed");
                this.run_once().await;
            })
        })?;

        Ok(job)
    }
}
