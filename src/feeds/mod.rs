pub mod delivery;
pub mod derivatives;
pub mod price;
pub mod schema;
pub mod values;

pub use delivery::parse_delivery_feed;
pub use derivatives::parse_derivatives_feed;
pub use price::parse_price_feed;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::error::Result;
use crate::feeds::schema::ColumnMap;
use crate::types::FeedKind;

/// Per-parse row accounting, logged after every feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub total: usize,
    pub kept: usize,
    /// Dropped by the equity/instrument filters. Expected, not an error.
    pub filtered: usize,
    /// Passed the filters but had an unparseable date or number.
    pub malformed: usize,
}

impl ParseStats {
    fn log(&self, feed: FeedKind) {
        if self.malformed > 0 {
            warn!(
                feed = %feed,
                total = self.total,
                kept = self.kept,
                filtered = self.filtered,
                malformed = self.malformed,
                "[PARSE] {feed}: skipped {} malformed rows",
                self.malformed,
            );
        } else {
            debug!(
                feed = %feed,
                total = self.total,
                kept = self.kept,
                filtered = self.filtered,
                "[PARSE] {feed}: kept {} of {} rows",
                self.kept,
                self.total,
            );
        }
    }
}

/// Read a CSV feed, resolve its header against the feed's alias table, and
/// hand every data row to `visit`. Rows the visitor returns `None` for count
/// as malformed; `Some(false)` counts as filtered.
fn read_feed<F>(feed: FeedKind, bytes: &[u8], mut visit: F) -> Result<ParseStats>
where
    F: FnMut(&ColumnMap, &StringRecord) -> Option<bool>,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::resolve(feed, &headers)?;

    let mut stats = ParseStats::default();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        stats.total += 1;
        match visit(&columns, &record) {
            Some(true) => stats.kept += 1,
            Some(false) => stats.filtered += 1,
            None => stats.malformed += 1,
        }
    }

    stats.log(feed);
    Ok(stats)
}
