//! Last-run cache in front of the aggregator.
//!
//! The staleness check and the refresh are not one atomic step: two
//! callers arriving in the same stale window may both aggregate. Both
//! write the same history rows, and the upsert key keeps the final state
//! convergent, so the duplicate work is tolerated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tally_core::HistoryDb;
use tokio::sync::RwLock;

use super::{AggregationRun, Aggregator};
use crate::batch::persist_run;

/// Owned cache of the most recent [`AggregationRun`].
pub struct RunCache {
    aggregator: Aggregator,
    ttl: Duration,
    history: Option<HistoryDb>,
    state: RwLock<Option<AggregationRun>>,
}

impl RunCache {
    pub fn new(aggregator: Aggregator, ttl: Duration) -> Self {
        Self { aggregator, ttl, history: None, state: RwLock::new(None) }
    }

    /// Persist the healthy sites of every refresh into `history`.
    pub fn with_history(mut self, history: HistoryDb) -> Self {
        self.history = Some(history);
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Return the cached run, aggregating first if `force` is set, nothing
    /// is cached yet, or the cached run is older than the TTL.
    pub async fn get_or_refresh(&self, force: bool) -> AggregationRun {
        if !force {
            let cached = self.state.read().await.clone();
            if let Some(run) = cached.filter(|run| !self.is_stale(run, Utc::now())) {
                tracing::debug!(last_updated = %run.last_updated, "serving cached run");
                return run;
            }
        }

        let run = self.aggregator.run(self.aggregator.today()).await;

        if let Some(history) = &self.history {
            persist_run(history, &run).await;
        }

        *self.state.write().await = Some(run.clone());
        run
    }

    fn is_stale(&self, run: &AggregationRun, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - run.refreshed_at > ttl,
            Err(_) => false,
        }
    }
}
