use chrono::NaiveDate;
use tracing::{info, warn};

use crate::db::MarketDataStore;
use crate::error::{AppError, Result};
use crate::scanner::baseline::HistoricalBaseline;
use crate::scanner::classifier::{classify, score};
use crate::types::{CanonicalDailyRecord, ScanOutcome, ScanParams, ScanResult};

/// Read-only accumulation scanner over a storage gateway.
pub struct Scanner<'a> {
    store: &'a dyn MarketDataStore,
}

impl<'a> Scanner<'a> {
    pub fn new(store: &'a dyn MarketDataStore) -> Self {
        Self { store }
    }

    /// Rank the day's universe against its trailing baseline.
    ///
    /// Fails with [`AppError::NoData`] when nothing is stored for `date` and
    /// [`AppError::InsufficientHistory`] when no earlier date exists. An empty
    /// vector means the scan ran and nothing qualified.
    pub async fn scan(&self, date: NaiveDate, params: &ScanParams) -> Result<Vec<ScanResult>> {
        params.validate()?;

        let universe = self.store.rows_for_date(date).await?;
        if universe.is_empty() {
            return Err(AppError::NoData(date));
        }

        let symbols: Vec<String> = universe.iter().map(|r| r.symbol.clone()).collect();
        let baseline =
            HistoricalBaseline::compute(self.store, date, params.lookback_days, &symbols).await?;
        if baseline.is_empty() {
            return Err(AppError::InsufficientHistory {
                date,
                lookback: params.lookback_days,
            });
        }

        let results = rank(&universe, &baseline, params);
        info!(
            date = %date,
            universe = universe.len(),
            with_history = baseline.len(),
            matches = results.len(),
            "[SCAN] {} of {} symbols flagged",
            results.len(),
            universe.len(),
        );
        Ok(results)
    }

    /// [`Scanner::scan`] for user-facing callers: failures become a reason
    /// string next to an empty result list.
    pub async fn run(&self, date: NaiveDate, params: &ScanParams) -> ScanOutcome {
        match self.scan(date, params).await {
            Ok(results) => ScanOutcome::found(date, results),
            Err(e) => {
                warn!(date = %date, "[SCAN] no results: {e}");
                ScanOutcome::failed(date, e.to_string())
            }
        }
    }
}

/// Evaluate every row of the universe and order survivors by score
/// (descending), then symbol (ascending).
pub fn rank(
    universe: &[CanonicalDailyRecord],
    baseline: &HistoricalBaseline,
    params: &ScanParams,
) -> Vec<ScanResult> {
    let mut results: Vec<ScanResult> = universe
        .iter()
        .filter_map(|r| evaluate(r, baseline.get(&r.symbol)?, params))
        .collect();

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    results
}

/// Derive metrics for one row and apply the three filters. `None` when the
/// row is excluded, including the zero-denominator cases.
pub fn evaluate(
    record: &CanonicalDailyRecord,
    avg_volume: f64,
    params: &ScanParams,
) -> Option<ScanResult> {
    let unusable = |x: f64| x.is_nan() || x <= 0.0;
    if unusable(avg_volume) || unusable(record.prev_close) {
        return None;
    }

    let vol_spike = record.volume as f64 / avg_volume;
    let price_change_pct = (record.close - record.prev_close) / record.prev_close * 100.0;

    let passes = record.delivery_pct >= params.min_delivery_pct
        && vol_spike >= params.volume_spike_multiplier
        && price_change_pct.abs() <= params.max_price_move_pct;
    if !passes {
        return None;
    }

    Some(ScanResult {
        symbol: record.symbol.clone(),
        open: record.open,
        high: record.high,
        low: record.low,
        close: record.close,
        prev_close: record.prev_close,
        price_change_pct,
        volume: record.volume,
        avg_volume,
        vol_spike,
        delivery_pct: record.delivery_pct,
        score: score(record.delivery_pct, vol_spike),
        signal_tag: classify(vol_spike, record.delivery_pct),
        has_derivatives: record.has_derivatives,
    })
}
