pub mod gateway;
pub mod models;
pub mod runs;
pub mod writer;

pub use gateway::{Gateway, ResultsFilter};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::CanonicalDailyRecord;

/// Storage contract consumed by the ingestion and scanner paths.
#[async_trait]
pub trait MarketDataStore: Send + Sync {
    /// Insert or replace rows keyed by (trade_date, symbol). All rows commit
    /// together or not at all. Returns the number of rows written.
    async fn upsert(&self, rows: &[CanonicalDailyRecord]) -> Result<u64>;

    /// Distinct stored trading dates, newest first.
    async fn available_dates(&self) -> Result<Vec<NaiveDate>>;

    /// Every stored row for one trading date, ordered by symbol.
    async fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<CanonicalDailyRecord>>;

    /// Mean volume per symbol over the `lookback_days` most recent distinct
    /// stored dates strictly before `before`. An empty `symbols` slice means
    /// every symbol.
    async fn average_volume(
        &self,
        before: NaiveDate,
        lookback_days: u32,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>>;
}
