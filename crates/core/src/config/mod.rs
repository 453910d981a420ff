//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (BBS_TALLY_*)
//! 2. TOML config file (if BBS_TALLY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub mod sites;
mod validation;

pub use sites::{
    AuthorExclusion, CounterSpec, DateText, DatedSpec, GenderedSpec, Paging, SiteKind, SiteSpec, default_sites,
};
pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (BBS_TALLY_*)
/// 2. TOML config file (if BBS_TALLY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite history database.
    ///
    /// Set via BBS_TALLY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Identifying User-Agent sent with every page request.
    ///
    /// Set via BBS_TALLY_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-page HTTP timeout in milliseconds.
    ///
    /// Set via BBS_TALLY_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Upper bound for one site's whole extraction, all pages included.
    ///
    /// Set via BBS_TALLY_SITE_TIMEOUT_MS environment variable.
    #[serde(default = "default_site_timeout_ms")]
    pub site_timeout_ms: u64,

    /// Number of sites scraped concurrently.
    ///
    /// Set via BBS_TALLY_MAX_CONCURRENCY environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Age after which a cached aggregation run is stale, in seconds.
    ///
    /// Set via BBS_TALLY_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// IANA zone defining the boards' local calendar ("today").
    ///
    /// Set via BBS_TALLY_TIMEZONE environment variable.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Six-field cron expression (UTC) for the daily batch.
    ///
    /// Set via BBS_TALLY_BATCH_CRON environment variable.
    #[serde(default = "default_batch_cron")]
    pub batch_cron: String,

    /// History rows older than this many days are purged after each batch. 0 keeps everything.
    ///
    /// Set via BBS_TALLY_RETENTION_DAYS environment variable.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Set via BBS_TALLY_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Set via BBS_TALLY_PORT environment variable.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Monitored sites. Usually replaced wholesale from the TOML file.
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteSpec>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./bbs-tally.sqlite")
}

fn default_user_agent() -> String {
    "bbs-tally/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_site_timeout_ms() -> u64 {
    120_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_timezone() -> String {
    "Asia/Tokyo".into()
}

fn default_batch_cron() -> String {
    // 19:00 in Asia/Tokyo
    "0 0 10 * * *".into()
}

fn default_retention_days() -> u32 {
    400
}

fn default_bind_addr() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            site_timeout_ms: default_site_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            cache_ttl_secs: default_cache_ttl_secs(),
            timezone: default_timezone(),
            batch_cron: default_batch_cron(),
            retention_days: default_retention_days(),
            bind_addr: default_bind_addr(),
            port: default_port(),
            sites: default_sites(),
        }
    }
}

impl AppConfig {
    /// Per-page timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn site_timeout(&self) -> Duration {
        Duration::from_millis(self.site_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The configured zone, falling back to Asia/Tokyo.
    ///
    /// `validate` rejects unknown zones, so the fallback only applies to
    /// hand-built configs.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Asia::Tokyo)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `BBS_TALLY_`
    /// 2. TOML file from `BBS_TALLY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("BBS_TALLY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("BBS_TALLY_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./bbs-tally.sqlite"));
        assert_eq!(config.user_agent, "bbs-tally/0.1");
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.tz(), chrono_tz::Asia::Tokyo);
        assert_eq!(config.sites.len(), 6);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.site_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_load_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BBS_TALLY_PORT", "9090");
            jail.set_env("BBS_TALLY_CACHE_TTL_SECS", "60");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.port, 9090);
            assert_eq!(config.cache_ttl_secs, 60);
            assert_eq!(config.sites.len(), 6);
            Ok(())
        });
    }

    #[test]
    fn test_load_sites_from_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tally.toml",
                r##"
                timezone = "UTC"

                [[sites]]
                id = "counter"
                display_name = "Counter"
                kind = "simple_counter"
                url = "https://counter.example/"
                selector = "#count"
                "##,
            )?;
            jail.set_env("BBS_TALLY_CONFIG_FILE", "tally.toml");
            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.timezone, "UTC");
            assert_eq!(config.sites.len(), 1);
            assert_eq!(config.sites[0].landing_url(), "https://counter.example/");
            Ok(())
        });
    }
}
