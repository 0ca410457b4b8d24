use chrono::NaiveDate;

/// Day-month-year layouts seen across the exchange archives. Month names are
/// matched case-insensitively by chrono (`30-JAN-2026`, `30-Jan-2026`).
const DMY_FORMATS: &[&str] = &[
    "%d-%b-%Y", "%d-%B-%Y", "%d-%m-%Y", "%d/%m/%Y", "%d/%b/%Y", "%d.%m.%Y", "%d %b %Y",
];

/// Parse a trade date in any of the supported layouts: ISO `YYYY-MM-DD`,
/// compact `YYYYMMDD`, or day-month-year with a separator.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let y = s[0..4].parse().ok()?;
        let m = s[4..6].parse().ok()?;
        let d = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    // Some exports append a time component ("2026-01-30 00:00:00").
    let s = match s.split_once(' ') {
        Some((date, time)) if time.contains(':') => date,
        _ => s,
    };

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    DMY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Trimmed, upper-cased identifier (symbols, series codes, ISINs, instrument types).
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// The delivery feed publishes `-` (or nothing) for securities without a
/// delivery position.
pub fn is_blank(raw: &str) -> bool {
    let s = raw.trim();
    s.is_empty() || s == "-"
}

/// Non-negative finite decimal. Thousands separators are tolerated.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let v: f64 = if s.contains(',') {
        s.replace(',', "").parse().ok()?
    } else {
        s.parse().ok()?
    };
    (v.is_finite() && v >= 0.0).then_some(v)
}

/// Non-negative whole quantity. Accepts `1200` and `1200.0`, rejects `1200.5`.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let s = raw.trim();
    if let Ok(q) = s.parse::<u64>() {
        return Some(q);
    }
    let v = parse_decimal(s)?;
    (v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_every_supported_date_layout() {
        let expected = ymd(2026, 1, 30);
        for raw in [
            "2026-01-30",
            "20260130",
            "30-Jan-2026",
            " 30-JAN-2026 ",
            "30-January-2026",
            "30-01-2026",
            "30/01/2026",
            "30.01.2026",
            "2026-01-30 00:00:00",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "layout {raw:?}");
        }
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("-"), None);
        assert_eq!(parse_date("20261340"), None);
        assert_eq!(parse_date("tomorrow"), None);
    }

    #[test]
    fn quantities_must_be_whole() {
        assert_eq!(parse_quantity("1200"), Some(1200));
        assert_eq!(parse_quantity(" 1200.0 "), Some(1200));
        assert_eq!(parse_quantity("1,200"), Some(1200));
        assert_eq!(parse_quantity("1200.5"), None);
        assert_eq!(parse_quantity("-5"), None);
    }

    #[test]
    fn decimals_reject_negative_and_nan() {
        assert_eq!(parse_decimal("101.25"), Some(101.25));
        assert_eq!(parse_decimal("-1"), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("-"), None);
    }

    #[test]
    fn blank_cells() {
        assert!(is_blank(" - "));
        assert!(is_blank(""));
        assert!(!is_blank("0"));
    }
}
