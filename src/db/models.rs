//! Row types for the tables in `migrations/`, decoded with `sqlx::FromRow`.

use chrono::NaiveDate;

use crate::types::{CanonicalDailyRecord, RunStatus, ScanResult, ScanRun, SignalTag};

#[derive(Debug, sqlx::FromRow)]
pub struct DailyRow {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
    pub volume: i64,
    pub delivery_qty: i64,
    pub delivery_pct: f64,
    pub has_derivatives: bool,
}

impl From<DailyRow> for CanonicalDailyRecord {
    fn from(r: DailyRow) -> Self {
        Self {
            trade_date: r.trade_date,
            symbol: r.symbol,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            prev_close: r.prev_close,
            volume: r.volume.max(0) as u64,
            delivery_qty: r.delivery_qty.max(0) as u64,
            delivery_pct: r.delivery_pct,
            has_derivatives: r.has_derivatives,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ScanResultRow {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
    pub price_change_pct: f64,
    pub volume: i64,
    pub avg_volume: f64,
    pub vol_spike: f64,
    pub delivery_pct: f64,
    pub score: f64,
    pub signal_tag: String,
    pub has_derivatives: bool,
}

impl From<ScanResultRow> for ScanResult {
    fn from(r: ScanResultRow) -> Self {
        Self {
            symbol: r.symbol,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            prev_close: r.prev_close,
            price_change_pct: r.price_change_pct,
            volume: r.volume.max(0) as u64,
            avg_volume: r.avg_volume,
            vol_spike: r.vol_spike,
            delivery_pct: r.delivery_pct,
            score: r.score,
            // Rows are only ever written from a SignalTag; anything else is a hand edit.
            signal_tag: SignalTag::parse(&r.signal_tag).unwrap_or(SignalTag::Accumulation),
            has_derivatives: r.has_derivatives,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ScanRunRow {
    pub run_date: NaiveDate,
    pub status: String,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl From<ScanRunRow> for ScanRun {
    fn from(r: ScanRunRow) -> Self {
        Self {
            run_date: r.run_date,
            // The CHECK constraint limits status to the three known values.
            status: RunStatus::parse(&r.status).unwrap_or(RunStatus::Failed),
            error_message: r.error_message,
            started_at: r.started_at,
            completed_at: r.completed_at,
        }
    }
}
