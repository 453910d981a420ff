//! Paged-by-date extractor.
//!
//! Counts posts dated on the target day. Date nodes are either matched
//! directly or, when a container selector is configured, looked up inside
//! each post container so the post's author can be inspected too.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tally_core::Error;
use tally_core::config::{DateText, DatedSpec};

use super::paging::{PageResult, PagedTally, walk_pages};
use super::{format_target, node_text, selector};
use crate::fetch::PageFetcher;

struct Exclusion {
    author: Selector,
    contains: String,
}

/// Compiled selectors and target for one dated board.
pub struct DatedScanner {
    container: Option<Selector>,
    date: Selector,
    date_text: DateText,
    exclusion: Option<Exclusion>,
    target_text: String,
}

impl DatedScanner {
    pub fn new(spec: &DatedSpec, target: NaiveDate) -> Result<Self, Error> {
        let container = spec.container_selector.as_deref().map(selector).transpose()?;
        let exclusion = match &spec.exclude_author {
            Some(rule) if container.is_some() => {
                Some(Exclusion { author: selector(&rule.selector)?, contains: rule.contains.clone() })
            }
            Some(_) => return Err(Error::InvalidInput("exclude_author requires container_selector".into())),
            None => None,
        };

        Ok(Self {
            container,
            date: selector(&spec.date_selector)?,
            date_text: spec.date_text,
            exclusion,
            target_text: format_target(target, &spec.date_format)?,
        })
    }

    /// Count one page's date nodes that fall on the target day.
    pub fn scan(&self, html: &str) -> PageResult {
        let document = Html::parse_document(html);
        let mut result = PageResult::default();

        match &self.container {
            Some(container) => {
                for post in document.select(container) {
                    let Some(date_node) = post.select(&self.date).next() else {
                        continue;
                    };
                    result.nodes += 1;
                    if self.excluded(post) {
                        continue;
                    }
                    self.tally(date_node, &mut result);
                }
            }
            None => {
                for date_node in document.select(&self.date) {
                    result.nodes += 1;
                    self.tally(date_node, &mut result);
                }
            }
        }

        result
    }

    fn tally(&self, date_node: ElementRef<'_>, result: &mut PageResult) {
        let text = match self.date_text {
            DateText::NodeText => node_text(date_node),
            DateText::NextSiblingText => next_sibling_text(date_node),
        };
        if text.contains(&self.target_text) {
            result.matches += 1;
        }
        result.dates.push(text);
    }

    fn excluded(&self, post: ElementRef<'_>) -> bool {
        let Some(rule) = &self.exclusion else {
            return false;
        };
        post.select(&rule.author).next().is_some_and(|author| node_text(author).contains(&rule.contains))
    }
}

/// Text of the first non-blank node after `node`: a bare text node or the next element's text.
fn next_sibling_text(node: ElementRef<'_>) -> String {
    for sibling in node.next_siblings() {
        if let Some(text) = sibling.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        } else if let Some(element) = ElementRef::wrap(sibling) {
            return node_text(element);
        }
    }
    String::new()
}

/// Walk a dated board and count the target day's posts.
pub async fn count_dated(
    fetcher: &dyn PageFetcher, site_id: &str, spec: &DatedSpec, target: NaiveDate,
) -> Result<PagedTally, Error> {
    let scanner = DatedScanner::new(spec, target)?;
    let tally = walk_pages(fetcher, site_id, &spec.paging, |html| scanner.scan(html)).await?;

    tracing::info!(
        site = site_id,
        count = tally.matches,
        pages = tally.pages_fetched,
        stop = ?tally.stop,
        "counted dated board"
    );

    Ok(tally)
}
