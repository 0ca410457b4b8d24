use csv::StringRecord;

use crate::config::{DOMESTIC_ISIN_PREFIX, EQUITY_SERIES};
use crate::error::Result;
use crate::feeds::schema::{field, ColumnMap};
use crate::feeds::values::{normalize_code, parse_date, parse_decimal, parse_quantity};
use crate::feeds::{read_feed, ParseStats};
use crate::types::{FeedKind, PriceRow};

/// Parse the daily price bhavcopy into equity rows.
///
/// Only `EQ` series rows whose ISIN is in the domestic-equity namespace are
/// kept; everything else (debt, ETFs under other series, foreign ISINs) is
/// filtered without error.
pub fn parse_price_feed(bytes: &[u8]) -> Result<(Vec<PriceRow>, ParseStats)> {
    let mut rows = Vec::new();
    let stats = read_feed(FeedKind::Price, bytes, |cols, rec| {
        if !is_domestic_equity(cols, rec) {
            return Some(false);
        }
        rows.push(price_row(cols, rec)?);
        Some(true)
    })?;
    Ok((rows, stats))
}

fn is_domestic_equity(cols: &ColumnMap, rec: &StringRecord) -> bool {
    normalize_code(cols.cell(rec, field::SERIES)) == EQUITY_SERIES
        && normalize_code(cols.cell(rec, field::ISIN)).starts_with(DOMESTIC_ISIN_PREFIX)
}

fn price_row(cols: &ColumnMap, rec: &StringRecord) -> Option<PriceRow> {
    let symbol = normalize_code(cols.cell(rec, field::SYMBOL));
    if symbol.is_empty() {
        return None;
    }
    Some(PriceRow {
        trade_date: parse_date(cols.cell(rec, field::TRADE_DATE))?,
        symbol,
        series: normalize_code(cols.cell(rec, field::SERIES)),
        open: parse_decimal(cols.cell(rec, field::OPEN))?,
        high: parse_decimal(cols.cell(rec, field::HIGH))?,
        low: parse_decimal(cols.cell(rec, field::LOW))?,
        close: parse_decimal(cols.cell(rec, field::CLOSE))?,
        prev_close: parse_decimal(cols.cell(rec, field::PREV_CLOSE))?,
        volume: parse_quantity(cols.cell(rec, field::VOLUME))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::error::{AppError, SchemaProblem};

    const UDIFF: &str = "\
TradDt,BizDt,Sgmt,Src,FinInstrmTp,FinInstrmId,ISIN,TckrSymb,SctySrs,OpnPric,HghPric,LwPric,ClsPric,LastPric,PrvsClsgPric,TtlTradgVol
2026-01-30,2026-01-30,CM,NSE,STK,2885,INE002A01018, reliance ,EQ,1400,1420,1390,1410,1411,1395,5000000
2026-01-30,2026-01-30,CM,NSE,STK,1,INE123B01011,SOMEBOND,N1,100,100,100,100,100,100,10
2026-01-30,2026-01-30,CM,NSE,STK,2,US0378331005,FOREIGN,EQ,10,11,9,10,10,10,100
2026-01-30,2026-01-30,CM,NSE,STK,11536,INE467B01029,TCS, eq ,3500,3550,3480,3520,3521,3510,1200000
";

    #[test]
    fn keeps_only_domestic_equity_rows() {
        let (rows, stats) = parse_price_feed(UDIFF.as_bytes()).unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["RELIANCE", "TCS"]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.malformed, 0);

        let tcs = &rows[1];
        assert_eq!(tcs.series, "EQ");
        assert_eq!(tcs.trade_date, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
        assert_eq!(tcs.volume, 1_200_000);
        assert!((tcs.prev_close - 3510.0).abs() < 1e-9);
    }

    #[test]
    fn legacy_bhavcopy_layout_is_accepted() {
        let csv = "\
SYMBOL,SERIES,OPEN,HIGH,LOW,CLOSE,LAST,PREVCLOSE,TOTTRDQTY,TOTTRDVAL,TIMESTAMP,TOTALTRADES,ISIN
INFY,EQ,1500,1510,1490,1505,1505,1498,300000,450000000,30-JAN-2026,9000,INE009A01021
";
        let (rows, _) = parse_price_feed(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trade_date, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
        assert_eq!(rows[0].volume, 300_000);
    }

    #[test]
    fn malformed_numbers_skip_the_row_only() {
        let csv = "\
TckrSymb,TradDt,SctySrs,OpnPric,HghPric,LwPric,ClsPric,PrvsClsgPric,TtlTradgVol,ISIN
AAA,20260130,EQ,10,11,9,10,abc,100,INE000A01010
BBB,20260130,EQ,10,11,9,10,10,100,INE000B01010
";
        let (rows, stats) = parse_price_feed(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "BBB");
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn missing_isin_column_is_a_schema_error() {
        let csv = "TckrSymb,TradDt,SctySrs,OpnPric,HghPric,LwPric,ClsPric,PrvsClsgPric,TtlTradgVol\n";
        let err = parse_price_feed(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            AppError::Schema {
                feed: FeedKind::Price,
                problem: SchemaProblem::Missing,
                column: "isin"
            }
        ));
    }
}
