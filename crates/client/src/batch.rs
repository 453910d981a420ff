//! Daily batch: aggregate once, persist the day's counts, apply retention.
//!
//! Only sites whose status is `ok` are written; a degraded site never
//! overwrites a real count with zero. Store failures never discard the
//! report: a failed upsert marks its site uncommitted, and a failed purge
//! turns the report's status into `partial`.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tally_core::HistoryDb;

use crate::aggregate::{AggregationRun, Aggregator, SiteStatus};

/// One site's line in a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub site_id: String,
    pub display_name: String,
    pub status: SiteStatus,
    pub total_count: u64,
    pub male_count: u64,
    pub female_count: u64,
    pub unknown_count: u64,
    /// Whether the row reached the history store.
    pub committed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// "success", or "partial" when the retention purge failed.
    pub status: &'static str,
    pub date: NaiveDate,
    pub results: Vec<BatchEntry>,
    /// History rows removed by the retention policy.
    pub purged: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purge_error: Option<String>,
}

/// Upsert every healthy site of `run` under `run.date`.
pub async fn persist_run(db: &HistoryDb, run: &AggregationRun) -> Vec<BatchEntry> {
    let mut entries = Vec::with_capacity(run.post_data.len());

    for report in &run.post_data {
        let committed = if report.status.is_ok() {
            match db.upsert_daily(&report.site_id, run.date, report.daily_counts()).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(site = %report.site_id, date = %run.date, error = %e, "failed to persist daily counts");
                    false
                }
            }
        } else {
            tracing::debug!(site = %report.site_id, status = ?report.status, "not persisting degraded site");
            false
        };

        entries.push(BatchEntry {
            site_id: report.site_id.clone(),
            display_name: report.display_name.clone(),
            status: report.status,
            total_count: report.total_count,
            male_count: report.male_count,
            female_count: report.female_count,
            unknown_count: report.unknown_count,
            committed,
        });
    }

    entries
}

/// Run the daily job for `today`.
///
/// `today` is fixed by the caller at job start so a run crossing midnight
/// still counts and stores a single day. With `retention_days > 0`, rows
/// older than `today - retention_days` are purged afterwards.
pub async fn run_daily_batch(
    aggregator: &Aggregator, db: &HistoryDb, today: NaiveDate, retention_days: u32,
) -> BatchReport {
    let run = aggregator.run(today).await;
    let results = persist_run(db, &run).await;

    let (purged, purge_error) = match today.checked_sub_days(Days::new(u64::from(retention_days))) {
        Some(cutoff) if retention_days > 0 => match db.purge_before(cutoff).await {
            Ok(purged) => (purged, None),
            Err(e) => {
                tracing::error!(date = %today, cutoff = %cutoff, error = %e, "retention purge failed");
                (0, Some(e.to_string()))
            }
        },
        _ => (0, None),
    };

    tracing::info!(
        date = %today,
        committed = results.iter().filter(|e| e.committed).count(),
        sites = results.len(),
        purged,
        "daily batch finished"
    );

    let status = if purge_error.is_some() { "partial" } else { "success" };
    BatchReport { status, date: today, results, purged, purge_error }
}
