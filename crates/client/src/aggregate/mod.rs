//! Aggregator: runs every configured site and folds the results into one run.
//!
//! Sites run as independent tasks on a bounded pool. Each task is wrapped
//! so that any failure (fetch, selector, date pattern, timeout, panic)
//! becomes a degraded report for that site alone; a run always carries one
//! report per configured site, in configuration order.
//!
//! Paged sites rely on boards listing posts newest first. See
//! [`crate::extract::paging`] for what happens when a board does not.

pub mod cache;

pub use cache::RunCache;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tally_core::{AppConfig, DailyCounts, Error, SiteSpec};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::extract::{GenderTally, SiteCount, extract_site};
use crate::fetch::{FetchClient, FetchConfig, PageFetcher};

/// Per-site outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Ok,
    /// Page fetched, but the expected element, digits or date pattern were missing.
    ExtractionFailed,
    /// Network failure, timeout or non-2xx status.
    FetchFailed,
    /// Anything else, including a crashed site task.
    ProcessingError,
}

impl SiteStatus {
    pub fn from_error(err: &Error) -> Self {
        if err.is_fetch() {
            SiteStatus::FetchFailed
        } else if err.is_extraction() {
            SiteStatus::ExtractionFailed
        } else {
            SiteStatus::ProcessingError
        }
    }

    pub fn is_ok(self) -> bool {
        self == SiteStatus::Ok
    }

    /// Display text used in place of a count for degraded sites.
    pub fn degraded_text(self) -> Option<&'static str> {
        match self {
            SiteStatus::Ok => None,
            SiteStatus::ExtractionFailed => Some("extraction failed"),
            SiteStatus::FetchFailed => Some("fetch error"),
            SiteStatus::ProcessingError => Some("processing error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Simple,
    Gender,
}

/// Gender breakdown shown for gendered boards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderDetail {
    pub male: u64,
    pub female: u64,
    pub unknown: u64,
    pub ratio: String,
}

impl From<GenderTally> for GenderDetail {
    fn from(tally: GenderTally) -> Self {
        Self { male: tally.male, female: tally.female, unknown: tally.unknown, ratio: tally.ratio() }
    }
}

/// One site's entry in a run. Degraded sites share the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteReport {
    pub site_id: String,
    pub display_name: String,
    /// "<n> posts", or the degraded text for the site's status.
    pub count: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub image_url: String,
    pub status: SiteStatus,
    pub total_count: u64,
    pub male_count: u64,
    pub female_count: u64,
    pub unknown_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_detail: Option<GenderDetail>,
}

impl SiteReport {
    fn base(site: &SiteSpec, status: SiteStatus, total: u64, genders: GenderTally) -> Self {
        let count = match status.degraded_text() {
            Some(text) => text.to_string(),
            None => format!("{total} posts"),
        };
        let (kind, gender_detail) = if site.is_gendered() {
            (ReportKind::Gender, Some(GenderDetail::from(genders)))
        } else {
            (ReportKind::Simple, None)
        };

        Self {
            site_id: site.id.clone(),
            display_name: site.display_name.clone(),
            count,
            url: site.landing_url().to_string(),
            kind,
            image_url: site.image_url.clone(),
            status,
            total_count: total,
            male_count: genders.male,
            female_count: genders.female,
            unknown_count: genders.unknown,
            gender_detail,
        }
    }

    pub fn counted(site: &SiteSpec, count: &SiteCount) -> Self {
        Self::base(site, SiteStatus::Ok, count.total(), count.genders())
    }

    /// Zero counts with the status's display text.
    pub fn degraded(site: &SiteSpec, status: SiteStatus) -> Self {
        Self::base(site, status, 0, GenderTally::default())
    }

    fn from_result(site: &SiteSpec, result: Result<SiteCount, Error>) -> Self {
        match result {
            Ok(count) => Self::counted(site, &count),
            Err(e) => {
                let status = SiteStatus::from_error(&e);
                tracing::warn!(site = %site.id, error = %e, status = ?status, "site degraded");
                Self::degraded(site, status)
            }
        }
    }

    /// Counts in the shape the history store persists.
    pub fn daily_counts(&self) -> DailyCounts {
        DailyCounts {
            total: to_i64(self.total_count),
            male: to_i64(self.male_count),
            female: to_i64(self.female_count),
            unknown: to_i64(self.unknown_count),
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Result of one aggregation over all sites.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationRun {
    /// When the run finished; drives cache staleness.
    #[serde(skip)]
    pub refreshed_at: DateTime<Utc>,
    /// `refreshed_at` in the sites' zone, "YYYY-MM-DD HH:MM:SS".
    pub last_updated: String,
    /// The day that was counted.
    pub date: NaiveDate,
    pub post_data: Vec<SiteReport>,
}

impl AggregationRun {
    pub fn ok_count(&self) -> usize {
        self.post_data.iter().filter(|r| r.status.is_ok()).count()
    }
}

/// Runs the site table against a [`PageFetcher`].
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<dyn PageFetcher>,
    sites: Arc<[SiteSpec]>,
    max_concurrency: usize,
    site_timeout: Duration,
    tz: Tz,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, sites: Vec<SiteSpec>) -> Self {
        Self {
            fetcher,
            sites: sites.into(),
            max_concurrency: 4,
            site_timeout: Duration::from_secs(120),
            tz: chrono_tz::Asia::Tokyo,
        }
    }

    /// Build an aggregator with a reqwest fetcher from the loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = FetchClient::new(FetchConfig::from(config))?;
        Ok(Self::new(Arc::new(fetcher), config.sites.clone())
            .with_max_concurrency(config.max_concurrency)
            .with_site_timeout(config.site_timeout())
            .with_timezone(config.tz()))
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_site_timeout(mut self, site_timeout: Duration) -> Self {
        self.site_timeout = site_timeout;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub fn sites(&self) -> &[SiteSpec] {
        &self.sites
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Today in the sites' local calendar.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Count `target` on every site.
    ///
    /// Never fails as a whole: each site's failure is confined to its own
    /// degraded report.
    pub async fn run(&self, target: NaiveDate) -> AggregationRun {
        tracing::info!(sites = self.sites.len(), date = %target, "aggregation started");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (index, site) in self.sites.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let site_timeout = self.site_timeout;

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let report = match tokio::time::timeout(site_timeout, extract_site(fetcher.as_ref(), &site, target)).await
                {
                    Ok(result) => SiteReport::from_result(&site, result),
                    Err(_) => {
                        tracing::warn!(site = %site.id, timeout_ms = site_timeout.as_millis() as u64, "site timed out");
                        SiteReport::degraded(&site, SiteStatus::FetchFailed)
                    }
                };
                (index, report)
            });
        }

        let mut slots: Vec<Option<SiteReport>> = vec![None; self.sites.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => tracing::error!(error = %e, "site task crashed"),
            }
        }

        let post_data: Vec<SiteReport> = slots
            .into_iter()
            .zip(self.sites.iter())
            .map(|(slot, site)| slot.unwrap_or_else(|| SiteReport::degraded(site, SiteStatus::ProcessingError)))
            .collect();

        let refreshed_at = Utc::now();
        let run = AggregationRun {
            refreshed_at,
            last_updated: refreshed_at.with_timezone(&self.tz).format("%Y-%m-%d %H:%M:%S").to_string(),
            date: target,
            post_data,
        };

        tracing::info!(
            date = %target,
            ok = run.ok_count(),
            degraded = run.post_data.len() - run.ok_count(),
            "aggregation finished"
        );

        run
    }
}
