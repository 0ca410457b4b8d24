use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::db::MarketDataStore;
use crate::error::{AppError, Result};
use crate::feeds::{parse_delivery_feed, parse_derivatives_feed, parse_price_feed};
use crate::fetcher::{DayFeeds, FeedSource};
use crate::merge::merge_day;
use crate::types::FeedKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested { rows: u64 },
    /// Holiday or not yet published: a required feed was absent.
    Skipped { reason: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub ingested: usize,
    pub skipped: usize,
    pub failed: Vec<(NaiveDate, String)>,
    pub rows: u64,
}

impl BatchSummary {
    /// Err when any date failed, so a CLI run can exit non-zero.
    pub fn ensure_complete(&self) -> Result<()> {
        match self.failed.first() {
            None => Ok(()),
            Some((first, reason)) => Err(AppError::IngestFailed {
                failed: self.failed.len(),
                first: *first,
                reason: reason.clone(),
            }),
        }
    }
}

/// Fetch → parse → merge → upsert, one trading date at a time.
pub struct Ingestor<'a> {
    source: &'a dyn FeedSource,
    store: &'a dyn MarketDataStore,
}

impl<'a> Ingestor<'a> {
    pub fn new(source: &'a dyn FeedSource, store: &'a dyn MarketDataStore) -> Self {
        Self { source, store }
    }

    pub async fn ingest_date(&self, date: NaiveDate) -> Result<IngestOutcome> {
        let DayFeeds { price, delivery, derivatives } = self.source.fetch(date).await?;

        let (price, delivery) = match (price, delivery) {
            (Some(price), Some(delivery)) => (price, delivery),
            (price, delivery) => {
                let reason = [(FeedKind::Price, price.is_none()), (FeedKind::Delivery, delivery.is_none())]
                    .iter()
                    .filter(|(_, absent)| *absent)
                    .map(|(feed, _)| format!("{feed} feed not available"))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(date = %date, "[INGEST] skipped: {reason}");
                return Ok(IngestOutcome::Skipped { reason });
            }
        };

        let (prices, _) = parse_price_feed(&price)?;
        let (deliveries, _) = parse_delivery_feed(&delivery)?;
        let derivatives = match derivatives {
            Some(bytes) => Some(parse_derivatives_feed(&bytes)?.0),
            None => {
                warn!(date = %date, "[INGEST] derivatives feed missing; has_derivatives will be false");
                None
            }
        };

        let (records, _) = merge_day(&prices, &deliveries, derivatives.as_ref())?;
        let rows = self.store.upsert(&records).await?;
        info!(date = %date, rows, "[INGEST] {date}: stored {rows} rows");
        Ok(IngestOutcome::Ingested { rows })
    }

    /// Ingest every calendar date in `[from, to]` with at most `concurrency`
    /// dates in flight. A failing date is recorded and the batch carries on.
    pub async fn ingest_range(&self, from: NaiveDate, to: NaiveDate, concurrency: usize) -> BatchSummary {
        let dates: Vec<NaiveDate> = from.iter_days().take_while(|d| *d <= to).collect();
        info!(from = %from, to = %to, dates = dates.len(), concurrency, "[INGEST] batch started");

        let mut outcomes = stream::iter(dates)
            .map(|date| async move { (date, self.ingest_date(date).await) })
            .buffer_unordered(concurrency.max(1));

        let mut summary = BatchSummary::default();
        while let Some((date, outcome)) = outcomes.next().await {
            match outcome {
                Ok(IngestOutcome::Ingested { rows }) => {
                    summary.ingested += 1;
                    summary.rows += rows;
                }
                Ok(IngestOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!(date = %date, "[INGEST] {date} failed: {e}");
                    summary.failed.push((date, e.to_string()));
                }
            }
        }
        summary.failed.sort_by_key(|(date, _)| *date);

        info!(
            ingested = summary.ingested,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            rows = summary.rows,
            "[INGEST] batch complete: {} ingested, {} skipped, {} failed",
            summary.ingested,
            summary.skipped,
            summary.failed.len(),
        );
        summary
    }
}
