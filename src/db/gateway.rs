use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::db::models::{DailyRow, ScanResultRow};
use crate::db::MarketDataStore;
use crate::error::Result;
use crate::types::{CanonicalDailyRecord, ScanResult};

/// Timestamp expression used for every server-assigned column.
pub(crate) const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Explicit handle to the SQLite store. Built once at startup and passed by
/// reference to every component that reads or writes market data.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub(crate) pool: SqlitePool,
}

/// Range filters over the stored scan results. Unset bounds default to
/// delivery 0-100, vol_spike 0-1000 and price change -100..100.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsFilter {
    pub min_delivery: Option<f64>,
    pub max_delivery: Option<f64>,
    pub min_vol: Option<f64>,
    pub max_vol: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub has_derivatives: Option<bool>,
}

impl Gateway {
    /// Open (creating if needed) the database file and apply migrations.
    pub async fn open(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    /// Private in-memory database. One connection, kept alive for the pool's
    /// lifetime, because each SQLite memory connection is its own database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Stored audit rows for `date`, best score first, ties by symbol.
    pub async fn scan_results(
        &self,
        date: NaiveDate,
        filter: &ResultsFilter,
    ) -> Result<Vec<ScanResult>> {
        let rows: Vec<ScanResultRow> = sqlx::query_as(
            r#"
            SELECT symbol, open, high, low, close, prev_close, price_change_pct,
                   volume, avg_volume, vol_spike, delivery_pct, score, signal_tag,
                   has_derivatives
            FROM scan_results
            WHERE trade_date = ?
              AND delivery_pct BETWEEN ? AND ?
              AND vol_spike BETWEEN ? AND ?
              AND price_change_pct BETWEEN ? AND ?
              AND (? IS NULL OR has_derivatives = ?)
            ORDER BY score DESC, symbol ASC
            "#,
        )
        .bind(date)
        .bind(filter.min_delivery.unwrap_or(0.0))
        .bind(filter.max_delivery.unwrap_or(100.0))
        .bind(filter.min_vol.unwrap_or(0.0))
        .bind(filter.max_vol.unwrap_or(1000.0))
        .bind(filter.min_price.unwrap_or(-100.0))
        .bind(filter.max_price.unwrap_or(100.0))
        .bind(filter.has_derivatives)
        .bind(filter.has_derivatives)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ScanResult::from).collect())
    }
}

#[async_trait]
impl MarketDataStore for Gateway {
    async fn upsert(&self, rows: &[CanonicalDailyRecord]) -> Result<u64> {
        self.upsert_daily(rows).await
    }

    async fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        let dates: Vec<NaiveDate> = sqlx::query_scalar(
            "SELECT DISTINCT trade_date FROM daily_equity ORDER BY trade_date DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(dates)
    }

    async fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<CanonicalDailyRecord>> {
        let rows: Vec<DailyRow> = sqlx::query_as(
            r#"
            SELECT trade_date, symbol, open, high, low, close, prev_close,
                   volume, delivery_qty, delivery_pct, has_derivatives
            FROM daily_equity
            WHERE trade_date = ?
            ORDER BY symbol
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        debug!(date = %date, rows = rows.len(), "[DB] universe fetched");
        Ok(rows.into_iter().map(CanonicalDailyRecord::from).collect())
    }

    async fn average_volume(
        &self,
        before: NaiveDate,
        lookback_days: u32,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>> {
        if lookback_days == 0 {
            return Ok(HashMap::new());
        }

        // The window is counted in distinct stored trading dates, not calendar
        // days, and is bounded strictly below `before`.
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r#"
            SELECT symbol, AVG(CAST(volume AS REAL)) AS avg_volume
            FROM daily_equity
            WHERE trade_date IN (
                SELECT DISTINCT trade_date
                FROM daily_equity
                WHERE trade_date < ?
                ORDER BY trade_date DESC
                LIMIT ?
            )
            GROUP BY symbol
            "#,
        )
        .bind(before)
        .bind(i64::from(lookback_days))
        .fetch_all(&self.pool)
        .await?;

        // Filtering here instead of in SQL avoids an IN list the size of the market.
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        Ok(rows
            .into_iter()
            .filter(|(symbol, _)| wanted.is_empty() || wanted.contains(symbol.as_str()))
            .collect())
    }
}
