//! Currency and date normalization
//!
//! Turns the loosely formatted cells found in broker and exchange exports
//! into `Decimal` amounts and `NaiveDateTime` values.
//!
//! Amounts are lenient: [`parse_amount`] never fails and reads anything it
//! cannot understand as zero. Callers that must tell "zero" apart from
//! "garbage" use [`try_parse_amount`] instead.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Cell contents treated as "no value".
const MISSING_MARKERS: &[&str] = &[
    "", "-", "--", "\u{2014}", "\u{2013}", "n/a", "na", "#n/a", "null", "none", "nan",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '\u{20ac}', '\u{a3}', '\u{a5}'];

const CURRENCY_CODES: &[&str] = &["USD", "EUR", "GBP"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%y", "%m/%d/%Y", "%m-%d-%Y", "%d-%b-%Y", "%b %d, %Y",
    "%B %d, %Y",
];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A raw scalar as handed over by an input collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Missing,
    Text(String),
    Number(f64),
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Missing)
    }
}

/// Why a strict amount parse did not produce a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Empty cell or a placeholder such as `-` or `N/A`.
    Missing,
    /// Something was there but it is not a number.
    Invalid(String),
}

/// Parse a monetary amount, reading blanks and garbage as zero.
///
/// `"(1,234.56)"` is `-1234.56`, `"$45.00"` is `45`, `""`, `"-"` and
/// `"abc"` are all `0`.
pub fn parse_amount(raw: &str) -> Decimal {
    try_parse_amount(raw).unwrap_or(Decimal::ZERO)
}

/// Same cleaning rules as [`parse_amount`], but blanks and garbage are
/// reported instead of being read as zero.
pub fn try_parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return Err(AmountError::Missing);
    }

    let mut cleaned = trimmed.to_string();
    for code in CURRENCY_CODES {
        cleaned = cleaned.replace(code, "");
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();

    // Both "$(25.50)" and "($25.50)" are losses.
    let (negative_parens, cleaned) = match cleaned
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    if cleaned.is_empty() || is_missing(cleaned) {
        return Err(AmountError::Missing);
    }

    let value = Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .map_err(|_| AmountError::Invalid(raw.trim().to_string()))?;

    Ok(if negative_parens { -value.abs() } else { value })
}

/// Lenient amount parse of an arbitrary scalar.
pub fn parse_scalar_amount(value: &Scalar) -> Decimal {
    match value {
        Scalar::Missing => Decimal::ZERO,
        Scalar::Text(s) => parse_amount(s),
        Scalar::Number(v) if v.is_finite() => Decimal::from_f64(*v).unwrap_or(Decimal::ZERO),
        Scalar::Number(_) => Decimal::ZERO,
    }
}

fn is_missing(s: &str) -> bool {
    let lower = s.to_lowercase();
    MISSING_MARKERS.contains(&lower.as_str())
}

/// Parse a calendar date or date-time string.
///
/// Plain dates are placed at midnight. Returns `None` for blanks and
/// anything that matches none of the supported layouts.
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if is_missing(s) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    let full_year = has_four_digit_run(s);
    let usable = |format: &&&str| full_year || !format.contains("%Y");

    for format in DATE_TIME_FORMATS.iter().filter(usable) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .filter(usable)
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// `%Y` also accepts one or two digits, so `3/7/23` would otherwise read
/// as year 3 under `%Y/%m/%d`.
fn has_four_digit_run(s: &str) -> bool {
    s.split(|c: char| !c.is_ascii_digit()).any(|run| run.len() >= 4)
}

/// Parse Unix epoch seconds (integer or fractional) into a UTC date-time.
///
/// Zero, negative, blank and non-numeric values are rejected rather than
/// mapped to the epoch.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if is_missing(s) {
        return None;
    }
    let seconds: f64 = s.parse().ok()?;
    timestamp_from_f64(seconds)
}

/// [`parse_timestamp`] for a scalar that may already be numeric.
pub fn parse_scalar_timestamp(value: &Scalar) -> Option<NaiveDateTime> {
    match value {
        Scalar::Missing => None,
        Scalar::Text(s) => parse_timestamp(s),
        Scalar::Number(v) => timestamp_from_f64(*v),
    }
}

fn timestamp_from_f64(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
}
