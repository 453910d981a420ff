//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use thiserror::Error;

use crate::config::{AppConfig, SiteKind, SiteSpec};

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

/// Whether a strftime pattern is usable for both formatting and parsing.
pub fn is_valid_date_format(pattern: &str) -> bool {
    !pattern.is_empty() && !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `site_timeout_ms` is shorter than `timeout_ms`
    /// - `max_concurrency` is 0
    /// - `user_agent` is empty
    /// - `timezone` is not an IANA zone name
    /// - any site is malformed (see `validate_site`)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.site_timeout_ms < self.timeout_ms {
            return Err(invalid("site_timeout_ms", "must not be shorter than timeout_ms"));
        }

        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.timezone.parse::<Tz>().is_err() {
            return Err(invalid("timezone", format!("unknown time zone '{}'", self.timezone)));
        }

        if self.sites.is_empty() {
            tracing::warn!("no sites configured; aggregation runs will be empty");
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id.as_str()) {
                return Err(invalid("sites", format!("duplicate site id '{}'", site.id)));
            }
            validate_site(site)?;
        }

        Ok(())
    }
}

/// Check one site's id, pagination bounds, selectors and date pattern.
fn validate_site(site: &SiteSpec) -> Result<(), ConfigError> {
    let field = |name: &str| format!("sites.{}.{name}", site.id);

    if site.id.trim().is_empty() {
        return Err(invalid("sites.id", "must not be empty"));
    }

    if let Some(paging) = site.paging() {
        if paging.step == 0 {
            return Err(invalid(field("step"), "must be greater than 0"));
        }
        if paging.start_page > paging.max_page {
            return Err(invalid(field("start_page"), "must not exceed max_page"));
        }
        if paging.base_url.is_empty() {
            return Err(invalid(field("base_url"), "must not be empty"));
        }
    }

    if let SiteKind::PagedByDate(dated) = &site.kind
        && dated.exclude_author.is_some()
        && dated.container_selector.is_none()
    {
        return Err(invalid(field("exclude_author"), "requires container_selector"));
    }

    if let Some(pattern) = site.date_format()
        && !is_valid_date_format(pattern)
    {
        return Err(invalid(field("date_format"), format!("'{pattern}' is not a valid strftime pattern")));
    }

    for selector in site.selectors() {
        if let Err(e) = scraper::Selector::parse(selector) {
            return Err(invalid(field("selector"), format!("'{selector}': {e}")));
        }
    }

    if let Err(e) = url::Url::parse(site.landing_url()) {
        return Err(invalid(field("url"), e.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthorExclusion, CounterSpec, default_sites};

    fn counter(id: &str, selector: &str) -> SiteSpec {
        SiteSpec {
            id: id.into(),
            display_name: id.into(),
            image_url: String::new(),
            kind: SiteKind::SimpleCounter(CounterSpec { url: "https://c.example/".into(), selector: selector.into() }),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_site_timeout_shorter_than_page_timeout() {
        let config = AppConfig { site_timeout_ms: 5_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "site_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = AppConfig { max_concurrency: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_concurrency"));
    }

    #[test]
    fn test_validate_unknown_timezone() {
        let config = AppConfig { timezone: "Mars/Olympus".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timezone"));
    }

    #[test]
    fn test_validate_duplicate_site_ids() {
        let config = AppConfig { sites: vec![counter("a", "#n"), counter("a", "#m")], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "sites"));
    }

    #[test]
    fn test_validate_bad_selector() {
        let config = AppConfig { sites: vec![counter("a", "div[")], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "sites.a.selector"));
    }

    #[test]
    fn test_validate_zero_step() {
        let mut sites = default_sites();
        if let SiteKind::PagedByDateAndGender(g) = &mut sites[2].kind {
            g.paging.step = 0;
        }
        let config = AppConfig { sites, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "sites.canelo.step"));
    }

    #[test]
    fn test_validate_author_exclusion_needs_container() {
        let mut sites = default_sites();
        if let SiteKind::PagedByDate(d) = &mut sites[1].kind {
            d.container_selector = None;
            d.exclude_author = Some(AuthorExclusion { selector: "div.user-name".into(), contains: "440".into() });
        }
        let config = AppConfig { sites, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "sites.440.exclude_author"));
    }

    #[test]
    fn test_date_format_check() {
        assert!(is_valid_date_format("%Y/%m/%d"));
        assert!(is_valid_date_format("%Y年%m月%d日"));
        assert!(!is_valid_date_format("%Q"));
        assert!(!is_valid_date_format(""));
    }
}
