//! Declarative column vocabulary for each feed kind.
//!
//! Every logical field lists the raw header spellings seen across the exchange's
//! file formats over the years. Headers are trimmed and compared ASCII
//! case-insensitively in a single pass over the header row.

use std::collections::HashMap;

use csv::StringRecord;

use crate::error::{AppError, Result, SchemaProblem};
use crate::types::FeedKind;

pub mod field {
    pub const SYMBOL: &str = "symbol";
    pub const TRADE_DATE: &str = "trade_date";
    pub const SERIES: &str = "series";
    pub const OPEN: &str = "open";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const CLOSE: &str = "close";
    pub const PREV_CLOSE: &str = "prev_close";
    pub const VOLUME: &str = "volume";
    pub const ISIN: &str = "isin";
    pub const DELIVERY_QTY: &str = "delivery_qty";
    pub const DELIVERY_PCT: &str = "delivery_pct";
    pub const INSTRUMENT: &str = "instrument";
}

#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

const fn alias(field: &'static str, aliases: &'static [&'static str]) -> FieldAliases {
    FieldAliases { field, aliases }
}

pub const PRICE_FIELDS: &[FieldAliases] = &[
    alias(field::SYMBOL, &["TckrSymb", "SYMBOL", "TICKER", "SCRIP_ID"]),
    alias(field::TRADE_DATE, &["TradDt", "TIMESTAMP", "DATE1", "DATE", "TRADE_DATE"]),
    alias(field::SERIES, &["SctySrs", "SERIES"]),
    alias(field::OPEN, &["OpnPric", "OPEN", "OPEN_PRICE"]),
    alias(field::HIGH, &["HghPric", "HIGH", "HIGH_PRICE"]),
    alias(field::LOW, &["LwPric", "LOW", "LOW_PRICE"]),
    alias(field::CLOSE, &["ClsPric", "CLOSE", "CLOSE_PRICE"]),
    alias(field::PREV_CLOSE, &["PrvsClsgPric", "PREVCLOSE", "PREV_CLOSE"]),
    alias(
        field::VOLUME,
        &["TtlTradgVol", "TOTTRDQTY", "VOLUME", "TRADED_QTY", "TTL_TRD_QNTY"],
    ),
    alias(field::ISIN, &["ISIN"]),
];

pub const DELIVERY_FIELDS: &[FieldAliases] = &[
    alias(field::SYMBOL, &["SYMBOL", "TckrSymb"]),
    alias(field::TRADE_DATE, &["DATE1", "DATE", "TRADE_DATE", "TradDt"]),
    alias(field::SERIES, &["SERIES", "SctySrs"]),
    alias(
        field::DELIVERY_QTY,
        &["DELIV_QTY", "DELIVERABLE_QTY", "DELIVERY_QTY"],
    ),
    alias(
        field::DELIVERY_PCT,
        &["DELIV_PER", "DELIV_PCT", "PCT_DELIV", "DELIVERY_PCT"],
    ),
];

pub const DERIVATIVES_FIELDS: &[FieldAliases] = &[
    alias(field::SYMBOL, &["TckrSymb", "SYMBOL"]),
    alias(field::INSTRUMENT, &["FinInstrmTp", "INSTRUMENT"]),
];

pub fn fields_for(feed: FeedKind) -> &'static [FieldAliases] {
    match feed {
        FeedKind::Price => PRICE_FIELDS,
        FeedKind::Delivery => DELIVERY_FIELDS,
        FeedKind::Derivatives => DERIVATIVES_FIELDS,
    }
}

/// Header names may carry padding and, on the first column, a UTF-8 BOM.
fn clean_header(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Logical field → column index for one parsed header row.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    /// Resolve every required field of `feed` against the header row.
    ///
    /// A field with no matching header is [`SchemaProblem::Missing`]; a field
    /// claimed by two headers (e.g. both `VOLUME` and `TOTTRDQTY`) is
    /// [`SchemaProblem::Ambiguous`].
    pub fn resolve(feed: FeedKind, headers: &StringRecord) -> Result<Self> {
        let fields = fields_for(feed);
        let mut indices: HashMap<&'static str, usize> = HashMap::with_capacity(fields.len());

        for (idx, raw) in headers.iter().enumerate() {
            let name = clean_header(raw);
            let Some(wanted) = fields
                .iter()
                .find(|f| f.aliases.iter().any(|a| a.eq_ignore_ascii_case(name)))
            else {
                continue;
            };
            if indices.insert(wanted.field, idx).is_some() {
                return Err(AppError::schema(feed, SchemaProblem::Ambiguous, wanted.field));
            }
        }

        if let Some(missing) = fields.iter().find(|f| !indices.contains_key(f.field)) {
            return Err(AppError::schema(feed, SchemaProblem::Missing, missing.field));
        }

        Ok(Self { indices })
    }

    /// Raw cell for `field`. Short rows read as empty cells.
    pub fn cell<'r>(&self, record: &'r StringRecord, field: &str) -> &'r str {
        self.indices
            .get(field)
            .and_then(|&idx| record.get(idx))
            .unwrap_or("")
    }
}
