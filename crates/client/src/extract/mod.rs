//! Post counting for the three site kinds.
//!
//! ### Strategies
//! - `counter`: a single page whose element shows the running count.
//! - `dated`: a paginated board; posts whose date text contains the target
//!   day are counted.
//! - `gendered`: like `dated`, but posts are containers and matching posts
//!   are bucketed by the poster's gender.
//!
//! ### Purity
//! Every scanner is a pure function of (HTML, target date). The target day
//! is chosen by the caller, never read from the clock here.

pub mod counter;
pub mod dated;
pub mod gendered;
pub mod paging;

pub use counter::{count_simple, read_counter};
pub use dated::{DatedScanner, count_dated};
pub use gendered::{Gender, GenderTally, GenderedScanner, classify_gender, count_gendered};
pub use paging::{PageResult, PagedTally, StopReason, walk_pages};

use std::fmt::Write;

use chrono::NaiveDate;
use scraper::{ElementRef, Selector};
use tally_core::config::{SiteKind, SiteSpec};
use tally_core::Error;

use crate::fetch::PageFetcher;

/// Raw outcome of one site's extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteCount {
    Counter(u64),
    Paged(PagedTally),
}

impl SiteCount {
    /// Posts counted for the site.
    pub fn total(&self) -> u64 {
        match self {
            SiteCount::Counter(n) => *n,
            SiteCount::Paged(tally) => tally.matches,
        }
    }

    pub fn genders(&self) -> GenderTally {
        match self {
            SiteCount::Counter(_) => GenderTally::default(),
            SiteCount::Paged(tally) => tally.genders,
        }
    }
}

/// Dispatch one site to the extractor for its kind.
pub async fn extract_site(fetcher: &dyn PageFetcher, site: &SiteSpec, target: NaiveDate) -> Result<SiteCount, Error> {
    match &site.kind {
        SiteKind::SimpleCounter(spec) => count_simple(fetcher, &site.id, spec).await.map(SiteCount::Counter),
        SiteKind::PagedByDate(spec) => count_dated(fetcher, &site.id, spec, target).await.map(SiteCount::Paged),
        SiteKind::PagedByDateAndGender(spec) => {
            count_gendered(fetcher, &site.id, spec, target).await.map(SiteCount::Paged)
        }
    }
}

/// Compile a configured CSS selector.
pub fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidSelector(format!("{css}: {e}")))
}

/// Whitespace-trimmed text content of an element.
pub fn node_text(node: ElementRef<'_>) -> String {
    node.text().collect::<String>().trim().to_string()
}

/// Render the target day the way the board prints dates.
pub fn format_target(date: NaiveDate, format: &str) -> Result<String, Error> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).map_err(|_| Error::InvalidDateFormat(format.to_string()))?;
    Ok(out)
}

/// Parse the leading date of a post's date text, ignoring any trailing time.
pub fn parse_date_prefix(text: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_and_remainder(text.trim(), format).ok().map(|(date, _)| date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixtureFetcher;
    use scraper::Html;
    use tally_core::config::{CounterSpec, default_sites};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_target() {
        assert_eq!(format_target(day(2024, 5, 3), "%Y/%m/%d").unwrap(), "2024/05/03");
        assert_eq!(format_target(day(2024, 5, 3), "%Y年%-m月%-d日").unwrap(), "2024年5月3日");
    }

    #[test]
    fn test_format_target_rejects_bad_pattern() {
        let err = format_target(day(2024, 5, 3), "%Q").unwrap_err();
        assert!(matches!(err, Error::InvalidDateFormat(_)));
    }

    #[test]
    fn test_parse_date_prefix() {
        assert_eq!(parse_date_prefix(" 2024/05/15 21:03 ", "%Y/%m/%d"), Some(day(2024, 5, 15)));
        assert_eq!(parse_date_prefix("2024/05/15(水)", "%Y/%m/%d"), Some(day(2024, 5, 15)));
        assert_eq!(parse_date_prefix("yesterday", "%Y/%m/%d"), None);
    }

    #[test]
    fn test_node_text_trims() {
        let html = Html::parse_fragment("<span>  2024/05/15 \n</span>");
        let node = html.select(&selector("span").unwrap()).next().unwrap();
        assert_eq!(node_text(node), "2024/05/15");
    }

    #[test]
    fn test_selector_error() {
        assert!(matches!(selector("dl[").unwrap_err(), Error::InvalidSelector(_)));
    }

    #[test]
    fn test_default_sites_selectors_compile() {
        for site in default_sites() {
            for css in site.selectors() {
                assert!(selector(css).is_ok(), "{}: {css}", site.id);
            }
        }
    }

    #[tokio::test]
    async fn test_extract_site_dispatches_counter() {
        let site = SiteSpec {
            id: "c".into(),
            display_name: "C".into(),
            image_url: String::new(),
            kind: SiteKind::SimpleCounter(CounterSpec { url: "https://c.example/".into(), selector: "b".into() }),
        };
        let fetcher = FixtureFetcher::new().page("https://c.example/", "<b>9</b>");

        let count = extract_site(&fetcher, &site, day(2024, 5, 15)).await.unwrap();
        assert_eq!(count, SiteCount::Counter(9));
        assert_eq!(count.total(), 9);
        assert_eq!(count.genders(), GenderTally::default());
    }
}
