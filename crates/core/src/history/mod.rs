//! SQLite-backed history of daily per-site post counts.
//!
//! One row per `(site_id, date)`; writes are upserts so the scheduled batch
//! and on-demand refreshes converge on the last write. Access is async via
//! tokio-rusqlite. It supports:
//!
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Point, recent-N and distinct-site queries
//! - Age-based retention purging

pub mod connection;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::HistoryDb;
pub use records::{DailyCounts, DailyRecord};
