//! Scraping side of bbs-tally.
//!
//! This crate provides the page fetcher, the three post-count extractors,
//! the aggregator that runs them over the site table, the run cache and the
//! daily batch job. It is shared by the server and its scheduler.

pub mod aggregate;
pub mod batch;
pub mod extract;
pub mod fetch;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregationRun, Aggregator, GenderDetail, RunCache, SiteReport, SiteStatus};
pub use batch::{BatchEntry, BatchReport, persist_run, run_daily_batch};
pub use extract::{GenderTally, SiteCount, StopReason, extract_site};
pub use fetch::{FetchClient, FetchConfig, PageFetcher};
