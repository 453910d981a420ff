//! Paged-by-date-and-gender extractor.
//!
//! Posts are containers holding a date node and, usually, a gender node.
//! Matching posts are bucketed as male, female or unknown; the site-level
//! result also carries the reduced male:female ratio.

use std::ops::AddAssign;

use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tally_core::Error;
use tally_core::config::GenderedSpec;

use super::paging::{PageResult, PagedTally, walk_pages};
use super::{format_target, node_text, parse_date_prefix, selector};
use crate::fetch::PageFetcher;

const MALE_KANJI: char = '男';
const FEMALE_KANJI: char = '女';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// Bucket a poster's gender label.
///
/// Native markers are checked first, male before female, so a mixed label
/// such as "男女" reads as male. Latin markers are matched
/// case-insensitively, female first because "female" contains "male".
pub fn classify_gender(label: &str) -> Gender {
    if label.contains(MALE_KANJI) {
        return Gender::Male;
    }
    if label.contains(FEMALE_KANJI) {
        return Gender::Female;
    }

    let lower = label.to_lowercase();
    if lower.contains("female") {
        Gender::Female
    } else if lower.contains("male") {
        Gender::Male
    } else {
        Gender::Unknown
    }
}

/// Per-gender post counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderTally {
    pub male: u64,
    pub female: u64,
    pub unknown: u64,
}

impl GenderTally {
    pub fn record(&mut self, gender: Gender) {
        match gender {
            Gender::Male => self.male += 1,
            Gender::Female => self.female += 1,
            Gender::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.male + self.female + self.unknown
    }

    /// Male:female ratio reduced to smallest integers.
    pub fn ratio(&self) -> String {
        match (self.male, self.female) {
            (0, 0) => "not computable".into(),
            (_, 0) => "male only".into(),
            (0, _) => "female only".into(),
            (m, f) => {
                let d = gcd(m, f);
                format!("{}:{}", m / d, f / d)
            }
        }
    }
}

impl AddAssign for GenderTally {
    fn add_assign(&mut self, rhs: Self) {
        self.male += rhs.male;
        self.female += rhs.female;
        self.unknown += rhs.unknown;
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Compiled selectors and target for one gendered board.
pub struct GenderedScanner {
    container: Selector,
    date: Selector,
    gender: Selector,
    date_format: String,
    target: NaiveDate,
    target_text: String,
}

impl GenderedScanner {
    pub fn new(spec: &GenderedSpec, target: NaiveDate) -> Result<Self, Error> {
        Ok(Self {
            container: selector(&spec.container_selector)?,
            date: selector(&spec.date_selector)?,
            gender: selector(&spec.gender_selector)?,
            date_format: spec.date_format.clone(),
            target,
            target_text: format_target(target, &spec.date_format)?,
        })
    }

    /// Count one page's posts for the target day.
    ///
    /// Iteration over the page ends at the first post whose parsed date is
    /// older than the target; posts with unparsable dates are not treated
    /// as older.
    pub fn scan(&self, html: &str) -> PageResult {
        let document = Html::parse_document(html);
        let mut result = PageResult::default();

        for post in document.select(&self.container) {
            result.nodes += 1;

            let Some(date_node) = post.select(&self.date).next() else {
                continue;
            };
            let date_text = node_text(date_node);

            if date_text.contains(&self.target_text) {
                result.matches += 1;
                let gender = post
                    .select(&self.gender)
                    .next()
                    .map_or(Gender::Unknown, |node| classify_gender(&node_text(node)));
                result.genders.record(gender);
            }

            let older = parse_date_prefix(&date_text, &self.date_format).is_some_and(|d| d < self.target);
            result.dates.push(date_text);
            if older {
                break;
            }
        }

        result
    }
}

/// Walk a gendered board and bucket the target day's posts.
pub async fn count_gendered(
    fetcher: &dyn PageFetcher, site_id: &str, spec: &GenderedSpec, target: NaiveDate,
) -> Result<PagedTally, Error> {
    let scanner = GenderedScanner::new(spec, target)?;
    let tally = walk_pages(fetcher, site_id, &spec.paging, |html| scanner.scan(html)).await?;

    tracing::info!(
        site = site_id,
        total = tally.matches,
        male = tally.genders.male,
        female = tally.genders.female,
        unknown = tally.genders.unknown,
        ratio = %tally.genders.ratio(),
        "counted gendered board"
    );

    Ok(tally)
}
