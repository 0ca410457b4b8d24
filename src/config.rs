use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::ScanParams;

pub const CM_BHAVCOPY_URL: &str =
    "https://nsearchives.nseindia.com/content/cm/BhavCopy_NSE_CM_0_0_0_{yyyymmdd}_F_0000.csv.zip";
pub const FO_BHAVCOPY_URL: &str =
    "https://nsearchives.nseindia.com/content/fo/BhavCopy_NSE_FO_0_0_0_{yyyymmdd}_F_0000.csv.zip";
pub const DELIVERY_URL: &str =
    "https://nsearchives.nseindia.com/products/content/sec_bhavdata_full_{ddmmyyyy}.csv";

/// Browser-like user agent; the archive host rejects obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Series code for ordinary equity in both the price and delivery feeds.
pub const EQUITY_SERIES: &str = "EQ";

/// ISIN prefix for domestic equity. Debt and foreign instruments share the EQ series
/// in some files, so the series check alone is not enough.
pub const DOMESTIC_ISIN_PREFIX: &str = "INE";

/// Instrument-type markers for single-stock futures and options.
/// `STF`/`STO` are the UDiFF codes, `FUTSTK`/`OPTSTK` the legacy bhavcopy ones.
pub const STOCK_DERIVATIVE_MARKERS: &[&str] = &["STF", "STO", "FUTSTK", "OPTSTK"];

/// Rows per INSERT statement. 13 binds per row keeps us well under SQLite's
/// host parameter limit.
pub const UPSERT_CHUNK_SIZE: usize = 500;

/// Fixed tagging and scoring constants. Not exposed as scan parameters.
pub mod signal {
    /// vol_spike must exceed this for a Strong Accumulation tag.
    pub const STRONG_VOL_SPIKE: f64 = 3.0;
    /// delivery_pct must exceed this for a Strong Accumulation tag.
    pub const STRONG_DELIVERY_PCT: f64 = 50.0;

    pub const DELIVERY_WEIGHT: f64 = 1.0;
    pub const VOL_SPIKE_WEIGHT: f64 = 10.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Directory holding locally downloaded feed files (FEED_DIR)
    pub feed_dir: PathBuf,
    pub cm_bhavcopy_url: String,
    pub fo_bhavcopy_url: String,
    pub delivery_url: String,
    /// Fixed gap between consecutive remote requests (FETCH_DELAY_MS)
    pub fetch_delay: Duration,
    pub fetch_timeout: Duration,
    /// Max dates ingested in parallel (INGEST_CONCURRENCY)
    pub ingest_concurrency: usize,
    /// Defaults for scans that don't specify their own parameters.
    pub scan_defaults: ScanParams,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = ScanParams::default();

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "scanner.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            feed_dir: std::env::var("FEED_DIR")
                .unwrap_or_else(|_| "downloads".to_string())
                .into(),
            cm_bhavcopy_url: std::env::var("CM_BHAVCOPY_URL")
                .unwrap_or_else(|_| CM_BHAVCOPY_URL.to_string()),
            fo_bhavcopy_url: std::env::var("FO_BHAVCOPY_URL")
                .unwrap_or_else(|_| FO_BHAVCOPY_URL.to_string()),
            delivery_url: std::env::var("DELIVERY_URL")
                .unwrap_or_else(|_| DELIVERY_URL.to_string()),
            fetch_delay: Duration::from_millis(
                std::env::var("FETCH_DELAY_MS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse::<u64>()
                    .unwrap_or(600),
            ),
            fetch_timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse::<u64>()
                    .unwrap_or(15),
            ),
            ingest_concurrency: std::env::var("INGEST_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse::<usize>()
                .map(|n| n.max(1))
                .unwrap_or(4),
            scan_defaults: ScanParams {
                min_delivery_pct: env_f64("SCAN_MIN_DELIVERY_PCT", defaults.min_delivery_pct)?,
                volume_spike_multiplier: env_f64(
                    "SCAN_VOLUME_SPIKE",
                    defaults.volume_spike_multiplier,
                )?,
                max_price_move_pct: env_f64("SCAN_MAX_PRICE_MOVE", defaults.max_price_move_pct)?,
                lookback_days: match std::env::var("SCAN_LOOKBACK_DAYS") {
                    Ok(v) => v.parse::<u32>().map_err(|_| {
                        AppError::Config("SCAN_LOOKBACK_DAYS must be a positive integer".to_string())
                    })?,
                    Err(_) => defaults.lookback_days,
                },
            },
        })
    }
}

/// Scanner thresholds must parse when set; only an unset variable takes the default.
fn env_f64(key: &str, default: f64) -> Result<f64> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {v:?}"))),
        Err(_) => Ok(default),
    }
}
