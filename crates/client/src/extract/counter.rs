//! Simple-counter extractor: one page, one element, one number.

use scraper::{Html, Selector};
use tally_core::Error;
use tally_core::config::CounterSpec;

use super::{node_text, selector};
use crate::fetch::PageFetcher;

/// Read the count shown by the first element matching `selector`.
///
/// All decimal digits in the element's text are joined and parsed, so
/// "1,234 posts" reads as 1234. Full-width digits count too. A missing
/// element or a text without digits is an extraction failure, never zero.
pub fn read_counter(html: &str, selector: &Selector) -> Result<u64, Error> {
    let document = Html::parse_document(html);
    let node = document
        .select(selector)
        .next()
        .ok_or_else(|| Error::ExtractFailed("counter element not found".into()))?;

    let text = node_text(node);
    let digits: String = text.chars().filter_map(ascii_digit).collect();
    if digits.is_empty() {
        return Err(Error::ExtractFailed(format!("no digits in counter text {text:?}")));
    }

    digits
        .parse()
        .map_err(|e| Error::ExtractFailed(format!("counter {digits} out of range: {e}")))
}

fn ascii_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        '\u{FF10}'..='\u{FF19}' => char::from_u32(c as u32 - 0xFF10 + '0' as u32),
        _ => None,
    }
}

/// Fetch a counter page and read its count.
pub async fn count_simple(fetcher: &dyn PageFetcher, site_id: &str, spec: &CounterSpec) -> Result<u64, Error> {
    let selector = selector(&spec.selector)?;
    let html = fetcher.fetch(&spec.url).await?;
    let count = read_counter(&html, &selector)?;

    tracing::info!(site = site_id, count, "read counter");
    Ok(count)
}
