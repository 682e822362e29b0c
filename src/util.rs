// Utility helpers for cell coercion and number formatting.
//
// This module holds the forgiving conversions from spreadsheet cells to typed
// values so the parser can assume clean numbers and dates.
use crate::types::Cell;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Day-first formats, tried in order. ISO layouts are accepted as well since
/// exports mix them with local dates.
const DATETIME_FORMATS: [&str; 8] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 6] = [
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%y",
];

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace and a leading `$`.
/// - Rejects values that contain alphabetic characters.
/// - Strips `","` only when it separates well-formed thousands groups
///   (`1,234,567.89`). Decimal commas such as `1,5` are rejected.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    let s = s.strip_prefix('$').unwrap_or(s).trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if s.contains(',') && !has_thousands_groups(s) {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok()
}

/// `true` for `d{1,3}(,ddd)+` optionally followed by a `.` fraction.
fn has_thousands_groups(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let int_part = match digits.split_once('.') {
        Some((int_part, frac)) => {
            if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            int_part
        }
        None => digits,
    };
    let mut groups = int_part.split(',');
    let lead_ok = groups
        .next()
        .map(|g| (1..=3).contains(&g.len()) && g.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    lead_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Coerce a revenue or distance cell. Missing, unparsable, negative and
/// non-finite values all contribute `0.0`; the flag reports whether the
/// default was applied to a non-empty cell.
pub fn coerce_amount(cell: &Cell) -> (f64, bool) {
    let parsed = match cell {
        Cell::Empty => return (0.0, false),
        Cell::Number(n) => Some(*n),
        Cell::Text(s) if s.trim().is_empty() => return (0.0, false),
        Cell::Text(s) => parse_f64_safe(Some(s)),
        Cell::Bool(_) | Cell::DateTime(_) => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => (v, false),
        _ => (0.0, true),
    }
}

/// Parse a date written day-first. Years below 1000 are rejected so that
/// `%Y` cannot read a two-digit `24` as the year 24; those fall through to
/// the `%y` layout.
pub fn parse_date_dayfirst(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if dt.year() >= 1000 {
                return Some(dt.date());
            }
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if d.year() >= 1000 {
                return Some(d);
            }
        }
    }
    None
}

/// Date coercion for the `Fecha` column. Bare numbers are not treated as
/// dates; native spreadsheet dates come through as `Cell::DateTime`.
pub fn coerce_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(s) => parse_date_dayfirst(s),
        _ => None,
    }
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    // `NaiveDate` supports subtraction; the result is a `Duration` in days.
    (end - start).num_days()
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_is_day_first() {
        assert_eq!(parse_date_dayfirst("05/03/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_dayfirst("5-3-2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_dayfirst("05.03.2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_dayfirst("05/03/2024 14:30"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_accepts_iso_and_short_years() {
        assert_eq!(parse_date_dayfirst("2024-03-05"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_dayfirst("2024-03-05 08:00:00"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_dayfirst("05/03/24"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date_dayfirst(""), None);
        assert_eq!(parse_date_dayfirst("sin fecha"), None);
        assert_eq!(parse_date_dayfirst("31/02/2024"), None);
    }

    #[test]
    fn test_coerce_date_ignores_numbers() {
        assert_eq!(coerce_date(&Cell::Number(45000.0)), None);
        let dt = ymd(2024, 1, 2).and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(coerce_date(&Cell::DateTime(dt)), Some(ymd(2024, 1, 2)));
    }

    #[test]
    fn test_coerce_amount_defaults_to_zero() {
        assert_eq!(coerce_amount(&Cell::Number(1500.5)), (1500.5, false));
        assert_eq!(coerce_amount(&Cell::text("$ 1,234.50")), (1234.5, false));
        assert_eq!(coerce_amount(&Cell::text("n/a")), (0.0, true));
        assert_eq!(coerce_amount(&Cell::text("1,5")), (0.0, true));
        assert_eq!(coerce_amount(&Cell::text("1.234,56")), (0.0, true));
        assert_eq!(coerce_amount(&Cell::text("12,34,5")), (0.0, true));
        assert_eq!(coerce_amount(&Cell::text("12,345,678")), (12_345_678.0, false));
        assert_eq!(coerce_amount(&Cell::Number(-20.0)), (0.0, true));
        assert_eq!(coerce_amount(&Cell::Number(f64::NAN)), (0.0, true));
        assert_eq!(coerce_amount(&Cell::Empty), (0.0, false));
        assert_eq!(coerce_amount(&Cell::Bool(true)), (0.0, true));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4_250_000.0, 2), "4,250,000.00");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(-12.345, 1), "-12.3");
    }

    #[test]
    fn test_days_diff_and_average() {
        assert_eq!(days_diff(ymd(2024, 3, 1), ymd(2024, 3, 31)), 30);
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[2.0, 4.0]), 3.0);
    }
}
