use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::types::{CanonicalDailyRecord, DeliveryRow, PriceRow};

type JoinKey<'a> = (NaiveDate, &'a str, &'a str);

/// Counts of rows that did not make it into the merged day.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub merged: usize,
    /// Price rows with no delivery row for the same (date, symbol, series).
    pub price_only: usize,
    /// Delivery rows with no price row.
    pub delivery_only: usize,
    /// Joined rows dropped because the exchange published no delivered quantity.
    pub unverified: usize,
    pub duplicate_delivery: usize,
}

/// Strict inner join of price and delivery rows on (trade_date, symbol, series),
/// stamped with the has-derivatives flag.
///
/// Symbols present on only one side are dropped, never null-filled. A join that
/// yields nothing fails with [`AppError::Merge`]: an empty day here has always
/// meant the feeds drifted apart, not that the market was closed.
pub fn merge_day(
    prices: &[PriceRow],
    deliveries: &[DeliveryRow],
    derivatives: Option<&HashSet<String>>,
) -> Result<(Vec<CanonicalDailyRecord>, MergeStats)> {
    let mut stats = MergeStats::default();

    let mut by_key: HashMap<JoinKey<'_>, &DeliveryRow> = HashMap::with_capacity(deliveries.len());
    for d in deliveries {
        let key = (d.trade_date, d.symbol.as_str(), d.series.as_str());
        if by_key.contains_key(&key) {
            stats.duplicate_delivery += 1;
            continue;
        }
        by_key.insert(key, d);
    }

    let mut matched: HashSet<JoinKey<'_>> = HashSet::with_capacity(by_key.len());
    let mut merged = Vec::with_capacity(prices.len().min(by_key.len()));

    for p in prices {
        let key = (p.trade_date, p.symbol.as_str(), p.series.as_str());
        let Some(d) = by_key.get(&key) else {
            stats.price_only += 1;
            continue;
        };
        if !matched.insert(key) {
            // Same security twice in the price feed; the first row already joined.
            continue;
        }
        let Some((delivery_qty, delivery_pct)) = delivery_figures(p, d) else {
            stats.unverified += 1;
            continue;
        };
        merged.push(CanonicalDailyRecord {
            trade_date: p.trade_date,
            symbol: p.symbol.clone(),
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            prev_close: p.prev_close,
            volume: p.volume,
            delivery_qty,
            delivery_pct,
            has_derivatives: derivatives.is_some_and(|set| set.contains(&p.symbol)),
        });
    }
    stats.delivery_only = by_key.len() - matched.len();
    stats.merged = merged.len();

    debug!(
        price_only = stats.price_only,
        delivery_only = stats.delivery_only,
        unverified = stats.unverified,
        duplicate_delivery = stats.duplicate_delivery,
        "[MERGE] dropped unmatched rows"
    );

    if merged.is_empty() {
        return Err(AppError::Merge(format!(
            "joined 0 rows from {} price and {} delivery rows",
            prices.len(),
            deliveries.len()
        )));
    }

    merged.sort_by(|a, b| (a.trade_date, &a.symbol).cmp(&(b.trade_date, &b.symbol)));
    info!(rows = stats.merged, "[MERGE] merged {} rows", stats.merged);
    Ok((merged, stats))
}

/// The feed's percentage is trusted as published. It is derived from
/// quantity/volume only when the feed left it blank.
fn delivery_figures(p: &PriceRow, d: &DeliveryRow) -> Option<(u64, f64)> {
    let qty = d.delivery_qty?;
    let pct = match d.delivery_pct {
        Some(pct) => pct,
        None if p.volume > 0 => (qty as f64 / p.volume as f64 * 100.0).min(100.0),
        None => return None,
    };
    Some((qty, pct))
}
