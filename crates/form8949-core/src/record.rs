//! Canonical transaction records
//!
//! Turns one [`RawRow`] into a [`TransactionRecord`], deciding its holding
//! period classification and cross-checking the supplied gain or loss
//! against `proceeds - cost basis + adjustment`.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ingest::{Column, InputVariant, RawRow, RowSet};
use crate::normalize::{parse_amount, parse_date_time, parse_timestamp, try_parse_amount, AmountError};

/// Holding periods of at most this many days are short-term.
pub const SHORT_TERM_MAX_DAYS: i64 = 365;

/// Allowed difference between a supplied and a computed gain or loss.
pub const GAIN_TOLERANCE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Action types of the exchange variant that count as disposals.
const DISPOSAL_ACTIONS: &[&str] = &["sell", "sale", "sold", "trade", "swap", "disposal"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub description: String,
    pub date_acquired: NaiveDate,
    pub date_sold: NaiveDate,
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    /// Form 8949 column (f).
    pub adjustment_code: Option<String>,
    /// Form 8949 column (g).
    pub adjustment: Decimal,
    pub gain_loss: Decimal,
    pub is_short_term: bool,
    pub holding_days: i64,
}

impl TransactionRecord {
    /// Build a record whose gain/loss and classification follow from its
    /// own fields.
    pub fn computed(
        description: impl Into<String>,
        date_acquired: NaiveDate,
        date_sold: NaiveDate,
        proceeds: Decimal,
        cost_basis: Decimal,
    ) -> Self {
        let holding_days = (date_sold - date_acquired).num_days();
        Self {
            description: description.into(),
            date_acquired,
            date_sold,
            proceeds,
            cost_basis,
            adjustment_code: None,
            adjustment: Decimal::ZERO,
            gain_loss: proceeds.saturating_sub(cost_basis),
            is_short_term: holding_days <= SHORT_TERM_MAX_DAYS,
            holding_days,
        }
    }

    /// `proceeds - cost_basis + adjustment`, `None` on overflow.
    pub fn computed_gain_loss(&self) -> Option<Decimal> {
        self.proceeds
            .checked_sub(self.cost_basis)?
            .checked_add(self.adjustment)
    }
}

/// The closed range `[Jan 1 00:00:00, Dec 31 23:59:59]` of one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxYear(pub i32);

impl TaxYear {
    pub fn start(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.0, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.0, 12, 31).and_then(|d| d.and_hms_opt(23, 59, 59))
    }

    pub fn contains(&self, moment: NaiveDateTime) -> bool {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => start <= moment && moment <= end,
            _ => false,
        }
    }
}

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-fatal problem found while reading one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub line: u64,
    pub message: String,
}

impl Warning {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(TransactionRecord, Vec<Warning>),
    /// Valid row, but sold outside the selected tax year.
    OutOfYear,
    /// Not a disposal (exchange variant action filter).
    Skipped(String),
    /// Bad data; the row is dropped.
    Rejected(Warning),
}

/// Outcome of building records from every row of an input.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub records: Vec<TransactionRecord>,
    pub warnings: Vec<Warning>,
    pub total_rows: usize,
    pub out_of_year: usize,
    pub skipped_action: usize,
    pub rejected: usize,
}

impl BuildReport {
    pub fn accepted(&self) -> usize {
        self.records.len()
    }
}

/// Build records from every row, in input order. Bad rows become warnings;
/// nothing stops the loop early.
pub fn build_records(rows: &RowSet, variant: InputVariant, year: TaxYear) -> BuildReport {
    let mut report = BuildReport {
        total_rows: rows.total(),
        ..Default::default()
    };

    for (line, error) in &rows.unreadable {
        report.rejected += 1;
        report
            .warnings
            .push(Warning::new(*line, format!("Unreadable row: {}", error)));
    }

    for row in &rows.rows {
        match build_record(row, variant, year) {
            RowOutcome::Accepted(record, warnings) => {
                report.records.push(record);
                report.warnings.extend(warnings);
            }
            RowOutcome::OutOfYear => report.out_of_year += 1,
            RowOutcome::Skipped(action) => {
                debug!(line = row.line, action = %action, "Skipping non-disposal row");
                report.skipped_action += 1;
            }
            RowOutcome::Rejected(warning) => {
                report.rejected += 1;
                report.warnings.push(warning);
            }
        }
    }

    for warning in &report.warnings {
        warn!("{}", warning);
    }

    report
}

/// Build zero or one record from a row.
pub fn build_record(row: &RawRow, variant: InputVariant, year: TaxYear) -> RowOutcome {
    let fields = match variant {
        InputVariant::Generic => generic_fields(row),
        InputVariant::Exchange => exchange_fields(row),
    };
    let fields = match fields {
        Ok(Some(fields)) => fields,
        Ok(None) => return RowOutcome::Skipped(row.get(Column::Action).to_string()),
        Err(message) => return RowOutcome::Rejected(Warning::new(row.line, message)),
    };

    if !year.contains(fields.sold_at) {
        return RowOutcome::OutOfYear;
    }

    match finish_record(row.line, fields) {
        Ok((record, warnings)) => RowOutcome::Accepted(record, warnings),
        Err(message) => RowOutcome::Rejected(Warning::new(row.line, message)),
    }
}

/// Classification signal carried by the row itself.
#[derive(Debug, Clone, PartialEq)]
enum TermSignal {
    None,
    /// A term column without an amount (generic variant).
    Term(bool),
    /// Separate short-term and long-term gain amounts (exchange variant).
    Amounts { short: Decimal, long: Decimal },
}

/// Row fields after parsing, before classification.
struct ParsedFields {
    description: String,
    acquired_at: NaiveDateTime,
    sold_at: NaiveDateTime,
    proceeds: Decimal,
    cost_basis: Decimal,
    adjustment_code: Option<String>,
    adjustment: Decimal,
    supplied_gain: Option<Decimal>,
    signal: TermSignal,
    warnings: Vec<String>,
}

fn generic_fields(row: &RawRow) -> Result<Option<ParsedFields>, String> {
    let description = row.get(Column::Description);
    if description.is_empty() {
        return Err("Missing description".to_string());
    }
    let acquired_at = parse_date_time(row.get(Column::DateAcquired)).ok_or_else(|| {
        format!(
            "Invalid date acquired '{}' for {}",
            row.get(Column::DateAcquired),
            description
        )
    })?;
    let sold_at = parse_date_time(row.get(Column::DateSold)).ok_or_else(|| {
        format!(
            "Invalid date sold '{}' for {}",
            row.get(Column::DateSold),
            description
        )
    })?;

    let mut warnings = Vec::new();

    let supplied_gain = match try_parse_amount(row.get(Column::GainLoss)) {
        Ok(value) => Some(value),
        Err(AmountError::Missing) => None,
        Err(AmountError::Invalid(raw)) => {
            warnings.push(format!(
                "Ignoring unreadable gain/loss '{}' for {}; using the computed value",
                raw, description
            ));
            None
        }
    };

    let signal = match parse_term(row.get(Column::Term)) {
        Ok(Some(short)) => TermSignal::Term(short),
        Ok(None) => TermSignal::None,
        Err(raw) => {
            warnings.push(format!(
                "Unknown term '{}' for {}; classifying by holding period",
                raw, description
            ));
            TermSignal::None
        }
    };

    let adjustment_code = Some(row.get(Column::Code))
        .filter(|code| !code.is_empty())
        .map(str::to_string);

    Ok(Some(ParsedFields {
        description: description.to_string(),
        acquired_at,
        sold_at,
        proceeds: parse_amount(row.get(Column::Proceeds)),
        cost_basis: parse_amount(row.get(Column::CostBasis)),
        adjustment_code,
        adjustment: parse_amount(row.get(Column::Adjustment)),
        supplied_gain,
        signal,
        warnings,
    }))
}

fn exchange_fields(row: &RawRow) -> Result<Option<ParsedFields>, String> {
    let action = row.get(Column::Action).to_lowercase();
    if !DISPOSAL_ACTIONS.contains(&action.as_str()) {
        return Ok(None);
    }

    let asset = row.get(Column::Asset);
    if asset.is_empty() {
        return Err("Missing asset".to_string());
    }
    let amount = parse_amount(row.get(Column::Amount)).normalize();
    let description = if amount.is_zero() {
        asset.to_string()
    } else {
        format!("{} {}", amount, asset)
    };

    let acquired_at = parse_timestamp(row.get(Column::DateAcquired)).ok_or_else(|| {
        format!(
            "Invalid acquisition timestamp '{}' for {}",
            row.get(Column::DateAcquired),
            description
        )
    })?;
    let sold_at = parse_timestamp(row.get(Column::DateSold)).ok_or_else(|| {
        format!(
            "Invalid sale timestamp '{}' for {}",
            row.get(Column::DateSold),
            description
        )
    })?;

    let short = parse_amount(row.get(Column::ShortTerm));
    let long = parse_amount(row.get(Column::LongTerm));
    let signal = if short.is_zero() && long.is_zero() {
        TermSignal::None
    } else {
        TermSignal::Amounts { short, long }
    };

    Ok(Some(ParsedFields {
        description,
        acquired_at,
        sold_at,
        proceeds: parse_amount(row.get(Column::Proceeds)),
        cost_basis: parse_amount(row.get(Column::CostBasis)),
        adjustment_code: None,
        adjustment: Decimal::ZERO,
        supplied_gain: None,
        signal,
        warnings: Vec::new(),
    }))
}

/// `Some(true)` for short-term, `Some(false)` for long-term, `None` when
/// blank, `Err` when unrecognised.
fn parse_term(raw: &str) -> Result<Option<bool>, String> {
    let key: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    match key.as_str() {
        "" => Ok(None),
        "short" | "shortterm" | "st" | "s" => Ok(Some(true)),
        "long" | "longterm" | "lt" | "l" => Ok(Some(false)),
        _ => Err(raw.to_string()),
    }
}

fn finish_record(
    line: u64,
    fields: ParsedFields,
) -> Result<(TransactionRecord, Vec<Warning>), String> {
    let out_of_range = || format!("Amounts out of range for {}", fields.description);
    let date_acquired = fields.acquired_at.date();
    let date_sold = fields.sold_at.date();
    let holding_days = (date_sold - date_acquired).num_days();
    let by_holding_period = holding_days <= SHORT_TERM_MAX_DAYS;
    let computed = fields
        .proceeds
        .checked_sub(fields.cost_basis)
        .and_then(|v| v.checked_add(fields.adjustment))
        .ok_or_else(out_of_range)?;

    let mut warnings: Vec<Warning> = fields
        .warnings
        .into_iter()
        .map(|message| Warning::new(line, message))
        .collect();

    let (gain_loss, is_short_term) = match fields.signal {
        TermSignal::None => (fields.supplied_gain.unwrap_or(computed), by_holding_period),
        TermSignal::Term(short) => (fields.supplied_gain.unwrap_or(computed), short),
        TermSignal::Amounts { short, long } if long.is_zero() => (short, true),
        TermSignal::Amounts { short, long } if short.is_zero() => (long, false),
        TermSignal::Amounts { short, long } => {
            warnings.push(Warning::new(
                line,
                format!(
                    "Both short-term ({}) and long-term ({}) amounts set for {}; \
                     using their sum and the holding period",
                    short, long, fields.description
                ),
            ));
            (short.checked_add(long).ok_or_else(out_of_range)?, by_holding_period)
        }
    };

    let mismatched = gain_loss
        .checked_sub(computed)
        .map_or(true, |diff| diff.abs() > GAIN_TOLERANCE);
    if mismatched {
        warnings.push(Warning::new(
            line,
            format!(
                "Gain/loss mismatch for {} sold {}: reported {}, computed {}",
                fields.description,
                date_sold.format("%m/%d/%Y"),
                gain_loss.round_dp(2),
                computed.round_dp(2)
            ),
        ));
    }

    let record = TransactionRecord {
        description: fields.description,
        date_acquired,
        date_sold,
        proceeds: fields.proceeds,
        cost_basis: fields.cost_basis,
        adjustment_code: fields.adjustment_code,
        adjustment: fields.adjustment,
        gain_loss,
        is_short_term,
        holding_days,
    };
    Ok((record, warnings))
}
