use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use crate::config::UPSERT_CHUNK_SIZE;
use crate::db::gateway::{Gateway, NOW_SQL};
use crate::error::Result;
use crate::types::{CanonicalDailyRecord, ScanResult};

impl Gateway {
    /// Conflict-replace every row in one transaction, so a date is either fully
    /// written or untouched. `last_updated` is refreshed on every write.
    pub async fn upsert_daily(&self, rows: &[CanonicalDailyRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO daily_equity (trade_date, symbol, open, high, low, close, prev_close, \
                 volume, delivery_qty, delivery_pct, has_derivatives, last_updated) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.trade_date)
                    .push_bind(r.symbol.as_str())
                    .push_bind(r.open)
                    .push_bind(r.high)
                    .push_bind(r.low)
                    .push_bind(r.close)
                    .push_bind(r.prev_close)
                    .push_bind(r.volume as i64)
                    .push_bind(r.delivery_qty as i64)
                    .push_bind(r.delivery_pct)
                    .push_bind(r.has_derivatives)
                    .push(NOW_SQL);
            });
            qb.push(
                " ON CONFLICT(trade_date, symbol) DO UPDATE SET \
                   open = excluded.open, \
                   high = excluded.high, \
                   low = excluded.low, \
                   close = excluded.close, \
                   prev_close = excluded.prev_close, \
                   volume = excluded.volume, \
                   delivery_qty = excluded.delivery_qty, \
                   delivery_pct = excluded.delivery_pct, \
                   has_derivatives = excluded.has_derivatives, \
                   last_updated = excluded.last_updated",
            );
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        info!(rows = written, "[DB] upserted {written} daily rows");
        Ok(written)
    }

    /// Persist scanner output for `date` as an audit trail. Rows from an earlier
    /// run of the same date that did not qualify this time are removed in the
    /// same transaction.
    pub async fn upsert_scan_results(&self, date: NaiveDate, results: &[ScanResult]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;

        sqlx::query("DELETE FROM scan_results WHERE trade_date = ?")
            .bind(date)
            .execute(&mut *tx)
            .await?;

        for chunk in results.chunks(UPSERT_CHUNK_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO scan_results (trade_date, symbol, open, high, low, close, prev_close, \
                 price_change_pct, volume, avg_volume, vol_spike, delivery_pct, score, signal_tag, \
                 has_derivatives, last_updated) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(date)
                    .push_bind(r.symbol.as_str())
                    .push_bind(r.open)
                    .push_bind(r.high)
                    .push_bind(r.low)
                    .push_bind(r.close)
                    .push_bind(r.prev_close)
                    .push_bind(r.price_change_pct)
                    .push_bind(r.volume as i64)
                    .push_bind(r.avg_volume)
                    .push_bind(r.vol_spike)
                    .push_bind(r.delivery_pct)
                    .push_bind(r.score)
                    .push_bind(r.signal_tag.to_string())
                    .push_bind(r.has_derivatives)
                    .push(NOW_SQL);
            });
            qb.push(
                " ON CONFLICT(trade_date, symbol) DO UPDATE SET \
                   open = excluded.open, \
                   high = excluded.high, \
                   low = excluded.low, \
                   close = excluded.close, \
                   prev_close = excluded.prev_close, \
                   price_change_pct = excluded.price_change_pct, \
                   volume = excluded.volume, \
                   avg_volume = excluded.avg_volume, \
                   vol_spike = excluded.vol_spike, \
                   delivery_pct = excluded.delivery_pct, \
                   score = excluded.score, \
                   signal_tag = excluded.signal_tag, \
                   has_derivatives = excluded.has_derivatives, \
                   last_updated = excluded.last_updated",
            );
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        info!(date = %date, rows = written, "[DB] stored {written} scan results");
        Ok(written)
    }
}
