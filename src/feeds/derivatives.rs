use std::collections::HashSet;

use crate::config::STOCK_DERIVATIVE_MARKERS;
use crate::error::Result;
use crate::feeds::schema::field;
use crate::feeds::values::normalize_code;
use crate::feeds::{read_feed, ParseStats};
use crate::types::FeedKind;

/// Symbols with single-stock futures or options listed in the derivatives bhavcopy.
/// Index derivatives and every other instrument type are ignored.
pub fn parse_derivatives_feed(bytes: &[u8]) -> Result<(HashSet<String>, ParseStats)> {
    let mut symbols = HashSet::new();
    let stats = read_feed(FeedKind::Derivatives, bytes, |cols, rec| {
        let instrument = normalize_code(cols.cell(rec, field::INSTRUMENT));
        if !STOCK_DERIVATIVE_MARKERS.contains(&instrument.as_str()) {
            return Some(false);
        }
        let symbol = normalize_code(cols.cell(rec, field::SYMBOL));
        if symbol.is_empty() {
            return None;
        }
        symbols.insert(symbol);
        Some(true)
    })?;
    Ok((symbols, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_stock_futures_and_options() {
        let csv = "\
TradDt,FinInstrmTp,TckrSymb,XpryDt,StrkPric,OptnTp
2026-01-30,STF,RELIANCE,2026-02-26,,
2026-01-30,STO,RELIANCE,2026-02-26,1400,CE
2026-01-30,sto, infy ,2026-02-26,1500,PE
2026-01-30,IDF,NIFTY,2026-02-26,,
2026-01-30,IDO,BANKNIFTY,2026-02-26,50000,CE
";
        let (symbols, stats) = parse_derivatives_feed(csv.as_bytes()).unwrap();
        assert_eq!(symbols.len(), 2);
        assert!(symbols.contains("RELIANCE"));
        assert!(symbols.contains("INFY"));
        assert!(!symbols.contains("NIFTY"));
        assert_eq!(stats.filtered, 2);
    }

    #[test]
    fn legacy_instrument_codes() {
        let csv = "INSTRUMENT,SYMBOL,EXPIRY_DT\nFUTSTK,SBIN,27-Feb-2026\nOPTIDX,NIFTY,27-Feb-2026\n";
        let (symbols, _) = parse_derivatives_feed(csv.as_bytes()).unwrap();
        assert_eq!(symbols.into_iter().collect::<Vec<_>>(), vec!["SBIN".to_string()]);
    }
}
