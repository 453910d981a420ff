//! Pagination driver shared by the paged extractors.
//!
//! Boards are assumed to list posts newest first, both across pages and
//! within a page. Under that assumption a page past the first one with no
//! post from the target day means every later page is older, so paging
//! stops there. A board that lists oldest first would be silently
//! truncated by this rule.

use serde::{Deserialize, Serialize};
use tally_core::Error;
use tally_core::config::Paging;

use super::gendered::GenderTally;
use crate::fetch::PageFetcher;

/// What one fetched page contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Date nodes (or post containers) found on the page, counted or not.
    pub nodes: usize,
    /// Date strings derived from those nodes, in page order.
    pub dates: Vec<String>,
    /// Posts dated on the target day.
    pub matches: u64,
    /// Gender split of `matches`; stays empty for boards without gender.
    pub genders: GenderTally,
}

impl PageResult {
    /// Whether this page had at least one post from the target day.
    pub fn has_target(&self) -> bool {
        self.matches > 0
    }
}

/// Why a paged extraction stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last configured page was visited.
    #[default]
    MaxPage,
    /// A page had no date nodes at all.
    NoContent,
    /// A page past the first had no post from the target day.
    NoTargetMatches,
    /// A page after the first could not be fetched; earlier pages still count.
    FetchFailed,
}

/// Site-level fold of all visited pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedTally {
    pub matches: u64,
    pub genders: GenderTally,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

impl PagedTally {
    fn absorb(&mut self, page: &PageResult) {
        self.matches += page.matches;
        self.genders += page.genders;
    }
}

/// Visit `paging`'s pages in order, scanning each with `scan`, until a stop rule fires.
///
/// A fetch failure on the first page is returned as an error so the site
/// degrades; a failure on a later page ends paging with the counts so far.
pub async fn walk_pages<F>(
    fetcher: &dyn PageFetcher, site_id: &str, paging: &Paging, mut scan: F,
) -> Result<PagedTally, Error>
where
    F: FnMut(&str) -> PageResult,
{
    let mut tally = PagedTally::default();

    for page in paging.pages() {
        let url = paging.url_for(page);
        tracing::debug!(site = site_id, page, url = %url, "fetching page");

        let html = match fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) if tally.pages_fetched == 0 => return Err(e),
            Err(e) => {
                tracing::warn!(site = site_id, page, error = %e, "page fetch failed; keeping earlier pages");
                tally.stop = StopReason::FetchFailed;
                return Ok(tally);
            }
        };
        tally.pages_fetched += 1;

        let result = scan(&html);

        if result.nodes == 0 {
            tracing::debug!(site = site_id, page, "no date nodes on page; stopping");
            tally.stop = StopReason::NoContent;
            break;
        }

        tally.absorb(&result);

        if !result.has_target() && page > paging.start_page {
            tracing::debug!(site = site_id, page, "no posts for target day on page; stopping");
            tally.stop = StopReason::NoTargetMatches;
            break;
        }
    }

    Ok(tally)
}
