//! Daily record CRUD operations.
//!
//! Provides the query surface the aggregation core relies on: upsert keyed
//! by `(site_id, date)`, point lookup, recent-N listing, distinct site ids
//! and retention purging.

use super::connection::HistoryDb;
use crate::Error;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row, types::Type};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str =
    "SELECT site_id, record_date, total_count, male_count, female_count, unknown_count, written_at FROM daily_posts";

/// Post counts for one site on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounts {
    pub total: i64,
    pub male: i64,
    pub female: i64,
    pub unknown: i64,
}

/// A persisted daily row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub site_id: String,
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub total_count: i64,
    pub male_count: i64,
    pub female_count: i64,
    pub unknown_count: i64,
    /// RFC 3339 timestamp of the last write for this key.
    pub written_at: String,
}

impl DailyRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw_date: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        Ok(DailyRecord {
            site_id: row.get(0)?,
            date,
            total_count: row.get(2)?,
            male_count: row.get(3)?,
            female_count: row.get(4)?,
            unknown_count: row.get(5)?,
            written_at: row.get(6)?,
        })
    }
}

impl HistoryDb {
    /// Insert or replace the counts for `(site_id, date)`.
    ///
    /// Last write wins: a second upsert for the same key overwrites the
    /// counts and `written_at` instead of adding a row.
    pub async fn upsert_daily(&self, site_id: &str, date: NaiveDate, counts: DailyCounts) -> Result<(), Error> {
        let site_id = site_id.to_string();
        let date = date.format(DATE_FORMAT).to_string();
        let written_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO daily_posts (
                    site_id, record_date, total_count, male_count, female_count, unknown_count, written_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(site_id, record_date) DO UPDATE SET
                    total_count = excluded.total_count,
                    male_count = excluded.male_count,
                    female_count = excluded.female_count,
                    unknown_count = excluded.unknown_count,
                    written_at = excluded.written_at",
                    params![
                        &site_id,
                        &date,
                        counts.total,
                        counts.male,
                        counts.female,
                        counts.unknown,
                        &written_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the row for one site on one day.
    ///
    /// Returns None if nothing was recorded for that key.
    pub async fn get_daily(&self, site_id: &str, date: NaiveDate) -> Result<Option<DailyRecord>, Error> {
        let site_id = site_id.to_string();
        let date = date.format(DATE_FORMAT).to_string();
        self.conn
            .call(move |conn| -> Result<Option<DailyRecord>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE site_id = ?1 AND record_date = ?2"))?;

                match stmt.query_row(params![site_id, date], DailyRecord::from_row) {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Most recent rows for a site, newest first, at most `limit` of them.
    pub async fn list_recent(&self, site_id: &str, limit: u32) -> Result<Vec<DailyRecord>, Error> {
        let site_id = site_id.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<DailyRecord>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE site_id = ?1 ORDER BY record_date DESC LIMIT ?2"
                ))?;

                let rows = stmt
                    .query_map(params![site_id, limit], DailyRecord::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Every site id with at least one row, sorted.
    pub async fn distinct_site_ids(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT site_id FROM daily_posts ORDER BY site_id")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete rows dated strictly before `cutoff`.
    ///
    /// Returns the number of deleted rows.
    pub async fn purge_before(&self, cutoff: NaiveDate) -> Result<u64, Error> {
        let cutoff = cutoff.format(DATE_FORMAT).to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM daily_posts WHERE record_date < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn total(n: i64) -> DailyCounts {
        DailyCounts { total: n, ..Default::default() }
    }

    async fn row_count(db: &HistoryDb) -> i64 {
        db.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM daily_posts", [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        let counts = DailyCounts { total: 5, male: 3, female: 2, unknown: 0 };
        db.upsert_daily("canelo", day(1), counts).await.unwrap();

        let record = db.get_daily("canelo", day(1)).await.unwrap().unwrap();
        assert_eq!(record.site_id, "canelo");
        assert_eq!(record.date, day(1));
        assert_eq!(record.total_count, 5);
        assert_eq!(record.male_count, 3);
        assert_eq!(record.female_count, 2);
        assert!(!record.written_at.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_idempotent() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        db.upsert_daily("mogura", day(1), total(7)).await.unwrap();
        db.upsert_daily("mogura", day(1), total(7)).await.unwrap();
        assert_eq!(row_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_on_conflict() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        db.upsert_daily("mogura", day(1), total(5)).await.unwrap();
        db.upsert_daily("mogura", day(1), total(9)).await.unwrap();

        let record = db.get_daily("mogura", day(1)).await.unwrap().unwrap();
        assert_eq!(record.total_count, 9);
        assert_eq!(row_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        assert!(db.get_daily("mogura", day(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_newest_first_and_limited() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        for d in 1..=5 {
            db.upsert_daily("440", day(d), total(i64::from(d))).await.unwrap();
        }
        db.upsert_daily("other", day(6), total(1)).await.unwrap();

        let recent = db.list_recent("440", 3).await.unwrap();
        let dates: Vec<NaiveDate> = recent.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(5), day(4), day(3)]);

        let all = db.list_recent("440", 30).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_distinct_site_ids() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        db.upsert_daily("canelo", day(1), total(1)).await.unwrap();
        db.upsert_daily("canelo", day(2), total(1)).await.unwrap();
        db.upsert_daily("440", day(2), total(1)).await.unwrap();

        let ids = db.distinct_site_ids().await.unwrap();
        assert_eq!(ids, vec!["440".to_string(), "canelo".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_before() {
        let db = HistoryDb::open_in_memory().await.unwrap();
        for d in 1..=4 {
            db.upsert_daily("mogura", day(d), total(1)).await.unwrap();
        }

        let deleted = db.purge_before(day(3)).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(db.get_daily("mogura", day(2)).await.unwrap().is_none());
        assert!(db.get_daily("mogura", day(3)).await.unwrap().is_some());
    }

    #[test]
    fn test_record_serializes_plain_date() {
        let record = DailyRecord {
            site_id: "mogura".into(),
            date: day(9),
            total_count: 1,
            male_count: 0,
            female_count: 0,
            unknown_count: 0,
            written_at: "2024-05-09T10:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-05-09");
        assert_eq!(json["total_count"], 1);
    }
}
