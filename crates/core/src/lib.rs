//! Core types and shared functionality for bbs-tally.
//!
//! This crate provides:
//! - Daily history store with SQLite backend
//! - Comparison engine over that history
//! - Unified error types
//! - Configuration structures, including the site table

pub mod compare;
pub mod config;
pub mod error;
pub mod history;

pub use compare::{Comparison, SiteComparison, compare};
pub use config::{AppConfig, ConfigError, SiteKind, SiteSpec};
pub use error::Error;
pub use history::{DailyCounts, DailyRecord, HistoryDb};
