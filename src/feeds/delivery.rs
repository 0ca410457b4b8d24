use csv::StringRecord;

use crate::config::EQUITY_SERIES;
use crate::error::Result;
use crate::feeds::schema::{field, ColumnMap};
use crate::feeds::values::{is_blank, normalize_code, parse_date, parse_decimal, parse_quantity};
use crate::feeds::{read_feed, ParseStats};
use crate::types::{DeliveryRow, FeedKind};

/// Parse the security-wise delivery feed into `EQ` series rows.
pub fn parse_delivery_feed(bytes: &[u8]) -> Result<(Vec<DeliveryRow>, ParseStats)> {
    let mut rows = Vec::new();
    let stats = read_feed(FeedKind::Delivery, bytes, |cols, rec| {
        let series = normalize_code(cols.cell(rec, field::SERIES));
        if series != EQUITY_SERIES {
            return Some(false);
        }
        rows.push(delivery_row(cols, rec, series)?);
        Some(true)
    })?;
    Ok((rows, stats))
}

fn delivery_row(cols: &ColumnMap, rec: &StringRecord, series: String) -> Option<DeliveryRow> {
    let symbol = normalize_code(cols.cell(rec, field::SYMBOL));
    if symbol.is_empty() {
        return None;
    }
    Some(DeliveryRow {
        trade_date: parse_date(cols.cell(rec, field::TRADE_DATE))?,
        symbol,
        series,
        delivery_qty: optional(cols.cell(rec, field::DELIVERY_QTY), parse_quantity)?,
        delivery_pct: optional(cols.cell(rec, field::DELIVERY_PCT), |s| {
            parse_decimal(s).filter(|p| *p <= 100.0)
        })?,
    })
}

/// Blank cells are `Some(None)`; present but unparseable cells are `None`.
fn optional<T>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<Option<T>> {
    if is_blank(raw) {
        Some(None)
    } else {
        parse(raw).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // Layout of sec_bhavdata_full: padded headers and values.
    const SEC_BHAVDATA: &str = "\
SYMBOL, SERIES, DATE1, PREV_CLOSE, OPEN_PRICE, HIGH_PRICE, LOW_PRICE, LAST_PRICE, CLOSE_PRICE, AVG_PRICE, TTL_TRD_QNTY, TURNOVER_LACS, NO_OF_TRADES, DELIV_QTY, DELIV_PER
RELIANCE, EQ, 30-Jan-2026, 1395.00, 1400.00, 1420.00, 1390.00, 1411.00, 1410.00, 1405.12, 5000000, 70256.00, 120000, 2750000, 55.00
GOLDBEES, BE, 30-Jan-2026, 60.00, 60.10, 60.50, 59.90, 60.20, 60.20, 60.21, 100000, 60.21, 500, 90000, 90.00
ILLIQUID, EQ, 30-Jan-2026, 10.00, 10.00, 10.00, 10.00, 10.00, 10.00, 10.00, 0, 0.00, 0, -, -
BROKEN, EQ, 30-Jan-2026, 10.00, 10.00, 10.00, 10.00, 10.00, 10.00, 10.00, 5, 0.00, 1, 4, 180.5
";

    #[test]
    fn parses_padded_sec_bhavdata_layout() {
        let (rows, stats) = parse_delivery_feed(SEC_BHAVDATA.as_bytes()).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.filtered, 1, "BE series is dropped");
        assert_eq!(stats.malformed, 1, "percentage above 100 is rejected");
        assert_eq!(rows.len(), 2);

        let rel = &rows[0];
        assert_eq!(rel.symbol, "RELIANCE");
        assert_eq!(rel.series, "EQ");
        assert_eq!(rel.trade_date, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
        assert_eq!(rel.delivery_qty, Some(2_750_000));
        assert_eq!(rel.delivery_pct, Some(55.0));
    }

    #[test]
    fn dash_cells_become_absent_values() {
        let (rows, _) = parse_delivery_feed(SEC_BHAVDATA.as_bytes()).unwrap();
        let illiquid = rows.iter().find(|r| r.symbol == "ILLIQUID").unwrap();
        assert_eq!(illiquid.delivery_qty, None);
        assert_eq!(illiquid.delivery_pct, None);
    }

    #[test]
    fn compact_dates_are_supported() {
        let csv = "SYMBOL,SERIES,TRADE_DATE,DELIVERABLE_QTY,DELIV_PCT\nabc ,eq,20260130,10,12.5\n";
        let (rows, _) = parse_delivery_feed(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].symbol, "ABC");
        assert_eq!(rows[0].trade_date, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
    }
}
