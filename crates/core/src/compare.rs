//! Day-over-day and week-over-week comparisons built on history.
//!
//! Comparisons are derived on demand and never persisted.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::history::{DailyRecord, HistoryDb};

/// Rendered in place of a delta when there is no usable baseline.
pub const PLACEHOLDER: &str = "---";

/// Delta between a current and a past total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub diff: Option<i64>,
    pub diff_text: String,
    /// Percentage change rounded to one decimal place.
    pub rate: Option<f64>,
    pub rate_text: String,
}

impl Comparison {
    fn unavailable() -> Self {
        Self { diff: None, diff_text: PLACEHOLDER.into(), rate: None, rate_text: PLACEHOLDER.into() }
    }
}

/// Compare `current` against `past`.
///
/// A missing or zero baseline yields placeholders for both diff and rate.
/// Positive values carry an explicit `+`.
pub fn compare(current: i64, past: Option<i64>) -> Comparison {
    let Some(past) = past.filter(|p| *p != 0) else {
        return Comparison::unavailable();
    };

    let diff = current - past;
    // `+ 0.0` folds a rounded -0.0 into 0.0
    let rate = ((diff as f64 / past as f64) * 100.0 * 10.0).round() / 10.0 + 0.0;

    let diff_text = if diff > 0 { format!("+{diff}") } else { diff.to_string() };
    let rate_text = if rate > 0.0 { format!("+{rate:.1}%") } else { format!("{rate:.1}%") };

    Comparison { diff: Some(diff), diff_text, rate: Some(rate), rate_text }
}

/// Today's row for one site with its two baselines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteComparison {
    pub today: DailyRecord,
    pub yesterday: Option<DailyRecord>,
    pub last_week: Option<DailyRecord>,
    pub yesterday_comparison: Comparison,
    pub last_week_comparison: Comparison,
}

impl SiteComparison {
    fn new(today: DailyRecord, yesterday: Option<DailyRecord>, last_week: Option<DailyRecord>) -> Self {
        let yesterday_comparison = compare(today.total_count, yesterday.as_ref().map(|r| r.total_count));
        let last_week_comparison = compare(today.total_count, last_week.as_ref().map(|r| r.total_count));
        Self { today, yesterday, last_week, yesterday_comparison, last_week_comparison }
    }
}

impl HistoryDb {
    /// Comparisons for every site in history, keyed by site id.
    ///
    /// Baselines are the previous day and the same weekday one week earlier.
    /// Sites without a row for `today` are omitted.
    pub async fn all_comparisons(&self, today: NaiveDate) -> Result<BTreeMap<String, SiteComparison>, Error> {
        let yesterday = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| Error::InvalidInput(format!("no day before {today}")))?;
        let last_week = today
            .checked_sub_days(Days::new(7))
            .ok_or_else(|| Error::InvalidInput(format!("no week before {today}")))?;

        let mut result = BTreeMap::new();
        for site_id in self.distinct_site_ids().await? {
            let Some(current) = self.get_daily(&site_id, today).await? else {
                continue;
            };
            let prev_day = self.get_daily(&site_id, yesterday).await?;
            let prev_week = self.get_daily(&site_id, last_week).await?;
            result.insert(site_id, SiteComparison::new(current, prev_day, prev_week));
        }

        Ok(result)
    }
}
