use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// Daily price bhavcopy (OHLC, previous close, traded volume, ISIN).
    Price,
    /// Security-wise delivery position (delivered quantity and percentage).
    Delivery,
    /// Derivatives bhavcopy, used only to decide which symbols have stock F&O.
    Derivatives,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeedKind::Price => "price",
            FeedKind::Delivery => "delivery",
            FeedKind::Derivatives => "derivatives",
        };
        write!(f, "{s}")
    }
}

/// One equity row from the price feed after the EQ/INE filter.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub series: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
    pub volume: u64,
}

/// One equity row from the delivery feed. Quantity and percentage are `None`
/// when the exchange publishes a blank or `-` for the security.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRow {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub series: String,
    pub delivery_qty: Option<u64>,
    pub delivery_pct: Option<f64>,
}

// ---------------------------------------------------------------------------
// Canonical daily record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDailyRecord {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
    pub volume: u64,
    pub delivery_qty: u64,
    /// 0-100. Taken from the feed as published; recomputed only when the feed left it blank.
    pub delivery_pct: f64,
    pub has_derivatives: bool,
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub min_delivery_pct: f64,
    pub volume_spike_multiplier: f64,
    pub max_price_move_pct: f64,
    pub lookback_days: u32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            min_delivery_pct: 40.0,
            volume_spike_multiplier: 1.5,
            max_price_move_pct: 5.0,
            lookback_days: 20,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.min_delivery_pct) {
            return Err(AppError::InvalidParams(format!(
                "min_delivery_pct must be within 0-100, got {}",
                self.min_delivery_pct
            )));
        }
        if !(self.volume_spike_multiplier.is_finite() && self.volume_spike_multiplier >= 0.0) {
            return Err(AppError::InvalidParams(format!(
                "volume_spike_multiplier must be a non-negative number, got {}",
                self.volume_spike_multiplier
            )));
        }
        if self.max_price_move_pct.is_nan() || self.max_price_move_pct < 0.0 {
            return Err(AppError::InvalidParams(format!(
                "max_price_move_pct must be non-negative, got {}",
                self.max_price_move_pct
            )));
        }
        if self.lookback_days == 0 {
            return Err(AppError::InvalidParams(
                "lookback_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalTag {
    #[serde(rename = "Accumulation")]
    Accumulation,
    /// vol_spike > 3.0 and delivery_pct > 50.
    #[serde(rename = "Strong Accumulation")]
    StrongAccumulation,
}

impl SignalTag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Accumulation" => Some(SignalTag::Accumulation),
            "Strong Accumulation" => Some(SignalTag::StrongAccumulation),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalTag::Accumulation => write!(f, "Accumulation"),
            SignalTag::StrongAccumulation => write!(f, "Strong Accumulation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
    pub price_change_pct: f64,
    pub volume: u64,
    pub avg_volume: f64,
    pub vol_spike: f64,
    pub delivery_pct: f64,
    pub score: f64,
    pub signal_tag: SignalTag,
    pub has_derivatives: bool,
}

/// What a caller of a scan sees. `reason` is set (and `results` empty) whenever
/// the scan could not run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub date: NaiveDate,
    pub results: Vec<ScanResult>,
    pub reason: Option<String>,
}

impl ScanOutcome {
    pub fn found(date: NaiveDate, results: Vec<ScanResult>) -> Self {
        Self { date, results, reason: None }
    }

    pub fn failed(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self { date, results: Vec::new(), reason: Some(reason.into()) }
    }
}

// ---------------------------------------------------------------------------
// Scan runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRun {
    pub run_date: NaiveDate,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}
