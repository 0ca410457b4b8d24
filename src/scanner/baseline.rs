use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::db::MarketDataStore;
use crate::error::Result;

/// Mean traded volume per symbol over the lookback window before an evaluation
/// date. Computed per scan and never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalBaseline {
    avg_volume: HashMap<String, f64>,
}

impl HistoricalBaseline {
    /// Empty means "insufficient history"; callers decide whether that is fatal.
    pub async fn compute(
        store: &dyn MarketDataStore,
        date: NaiveDate,
        lookback_days: u32,
        symbols: &[String],
    ) -> Result<Self> {
        let avg_volume = store.average_volume(date, lookback_days, symbols).await?;
        debug!(
            date = %date,
            lookback_days,
            symbols = avg_volume.len(),
            "[BASELINE] computed average volume"
        );
        Ok(Self { avg_volume })
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.avg_volume.get(symbol).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.avg_volume.is_empty()
    }

    pub fn len(&self) -> usize {
        self.avg_volume.len()
    }
}

impl From<HashMap<String, f64>> for HistoricalBaseline {
    fn from(avg_volume: HashMap<String, f64>) -> Self {
        Self { avg_volume }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Gateway;
    use crate::types::CanonicalDailyRecord;

    fn row(day: u32, symbol: &str, volume: u64) -> CanonicalDailyRecord {
        CanonicalDailyRecord {
            trade_date: NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
            symbol: symbol.to_string(),
            open: 10.0,
            high: 10.0,
            low: 10.0,
            close: 10.0,
            prev_close: 10.0,
            volume,
            delivery_qty: 0,
            delivery_pct: 0.0,
            has_derivatives: false,
        }
    }

    #[tokio::test]
    async fn no_prior_dates_gives_an_empty_baseline() {
        let gw = Gateway::in_memory().await.unwrap();
        gw.upsert_daily(&[row(2, "AAA", 100)]).await.unwrap();

        let first_day = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        let baseline = HistoricalBaseline::compute(&gw, first_day, 20, &[]).await.unwrap();
        assert!(baseline.is_empty());
    }

    #[tokio::test]
    async fn baseline_covers_only_requested_symbols() {
        let gw = Gateway::in_memory().await.unwrap();
        gw.upsert_daily(&[row(2, "AAA", 100), row(2, "BBB", 200), row(3, "AAA", 300)])
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 2, 4).unwrap();
        let baseline = HistoricalBaseline::compute(&gw, date, 5, &["AAA".to_string()])
            .await
            .unwrap();
        assert_eq!(baseline.len(), 1);
        assert_eq!(baseline.get("AAA"), Some(200.0));
        assert_eq!(baseline.get("BBB"), None);
    }
}
