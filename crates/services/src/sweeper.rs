//! Periodic check-in maintenance.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use crate::clock::Clock;
use crate::dao::checkin::CheckInDao;

/// Starts the overdue sweep on `cron` (six-field, seconds first). The
/// returned scheduler must be kept alive for the job to keep firing.
pub async fn start_overdue_sweep(
    cron: &str,
    checkins: Arc<CheckInDao>,
    clock: Arc<dyn Clock>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_id, _scheduler| {
        let checkins = checkins.clone();
        let clock = clock.clone();
        Box::pin(async move {
            let now = bson::DateTime::from_chrono(clock.now());
            if let Err(e) = checkins.sweep_overdue(now).await {
                error!(error = %e, "Check-in sweep failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(cron, "Check-in overdue sweep scheduled");
    Ok(scheduler)
}
