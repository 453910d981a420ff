//! Cron trigger for the daily batch.

use anyhow::Result;
use tally_client::{Aggregator, run_daily_batch};
use tally_core::HistoryDb;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Register and start the daily batch on `cron` (six fields, UTC).
///
/// The returned scheduler must be kept alive for the job to keep firing.
pub async fn start_daily_batch(
    cron: &str, aggregator: Aggregator, history: HistoryDb, retention_days: u32,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_id, _lock| {
        let aggregator = aggregator.clone();
        let history = history.clone();
        Box::pin(async move {
            let today = aggregator.today();
            tracing::info!(target: "scheduler", date = %today, "daily batch triggered");
            let report = run_daily_batch(&aggregator, &history, today, retention_days).await;
            tracing::info!(
                target: "scheduler",
                date = %report.date,
                status = report.status,
                committed = report.results.iter().filter(|e| e.committed).count(),
                "daily batch stored"
            );
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(target: "scheduler", cron, "daily batch registered");
    scheduler.start().await?;

    Ok(scheduler)
}
