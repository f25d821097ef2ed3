//! CSV ingestion
//!
//! Each input variant declares the columns it needs. Headers are matched
//! loosely (case, spacing, punctuation and a byte order mark are ignored,
//! and every column has a few aliases) because exports rarely agree on
//! naming. All required columns are checked before any row is read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FormError;

/// Which export layout the CSV follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputVariant {
    /// One row per disposal with calendar dates, laid out like the form.
    #[default]
    Generic,
    /// Crypto tax export: epoch-second dates, an action type column and
    /// separate short-term / long-term gain columns.
    Exchange,
}

impl InputVariant {
    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            InputVariant::Generic => GENERIC_COLUMNS,
            InputVariant::Exchange => EXCHANGE_COLUMNS,
        }
    }
}

impl std::str::FromStr for InputVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic" | "form" => Ok(InputVariant::Generic),
            "exchange" | "crypto" => Ok(InputVariant::Exchange),
            other => Err(format!(
                "Unknown input variant '{}'. Use 'generic' or 'exchange'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Description,
    DateAcquired,
    DateSold,
    Proceeds,
    CostBasis,
    GainLoss,
    Term,
    Code,
    Adjustment,
    Action,
    Asset,
    Amount,
    ShortTerm,
    LongTerm,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub column: Column,
    /// Display name, also used in the missing-columns message.
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

const fn required(column: Column, name: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec {
        column,
        name,
        aliases,
        required: true,
    }
}

const fn optional(column: Column, name: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec {
        column,
        name,
        aliases,
        required: false,
    }
}

const DATE_ACQUIRED_ALIASES: &[&str] = &["Acquired", "Purchase Date", "Date Purchased", "Open Date"];
const DATE_SOLD_ALIASES: &[&str] = &["Sold", "Sale Date", "Date Disposed", "Close Date"];
const PROCEEDS_ALIASES: &[&str] = &["Sales Price", "Sale Proceeds", "Gross Proceeds"];
const COST_BASIS_ALIASES: &[&str] = &["Cost", "Basis", "Cost or Other Basis"];

const GENERIC_COLUMNS: &[ColumnSpec] = &[
    required(Column::Description, "Description", &["Description of Property", "Security"]),
    required(Column::DateAcquired, "Date Acquired", DATE_ACQUIRED_ALIASES),
    required(Column::DateSold, "Date Sold", DATE_SOLD_ALIASES),
    required(Column::Proceeds, "Proceeds", PROCEEDS_ALIASES),
    required(Column::CostBasis, "Cost Basis", COST_BASIS_ALIASES),
    optional(Column::GainLoss, "Gain/Loss", &["Gain or Loss", "Gain", "Realized Gain"]),
    optional(Column::Term, "Term", &["Holding Period", "Short/Long"]),
    optional(Column::Code, "Code", &["Adjustment Code"]),
    optional(Column::Adjustment, "Adjustment", &["Adjustment Amount", "Wash Sale Loss Disallowed"]),
];

const EXCHANGE_COLUMNS: &[ColumnSpec] = &[
    required(Column::Action, "Type", &["Action", "Transaction Type", "Kind"]),
    required(Column::Asset, "Asset", &["Currency", "Symbol", "Coin"]),
    required(Column::Amount, "Amount", &["Quantity", "Qty"]),
    required(Column::DateAcquired, "Date Acquired", DATE_ACQUIRED_ALIASES),
    required(Column::DateSold, "Date Sold", DATE_SOLD_ALIASES),
    required(Column::Proceeds, "Proceeds", PROCEEDS_ALIASES),
    required(Column::CostBasis, "Cost Basis", COST_BASIS_ALIASES),
    optional(Column::ShortTerm, "Short Term", &["Short Term Gain", "ST Gain"]),
    optional(Column::LongTerm, "Long Term", &["Long Term Gain", "LT Gain"]),
];

/// One data row, keyed by resolved column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// 1-based line number in the source file (the header is line 1).
    pub line: u64,
    pub fields: BTreeMap<Column, String>,
}

impl RawRow {
    pub fn new(line: u64) -> Self {
        Self {
            line,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: Column, value: &str) -> Self {
        self.fields.insert(column, value.trim().to_string());
        self
    }

    /// Trimmed cell contents, empty when the column is absent.
    pub fn get(&self, column: Column) -> &str {
        self.fields.get(&column).map(String::as_str).unwrap_or("")
    }

    pub fn has(&self, column: Column) -> bool {
        self.fields.contains_key(&column)
    }
}

/// Rows read from a CSV plus the lines the CSV reader itself choked on.
#[derive(Debug, Default)]
pub struct RowSet {
    pub rows: Vec<RawRow>,
    pub unreadable: Vec<(u64, String)>,
}

impl RowSet {
    pub fn total(&self) -> usize {
        self.rows.len() + self.unreadable.len()
    }
}

/// Reduce a header to lowercase alphanumerics so `Date Sold`, `date_sold`
/// and `DATE-SOLD ` compare equal.
fn header_key(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map each column of `variant` to its header index.
///
/// Fails with every missing required column listed at once.
pub fn resolve_columns(
    headers: &[&str],
    variant: InputVariant,
) -> Result<BTreeMap<Column, usize>, FormError> {
    let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    let mut resolved = BTreeMap::new();
    let mut missing = Vec::new();

    for spec in variant.columns() {
        let wanted: Vec<String> = std::iter::once(spec.name)
            .chain(spec.aliases.iter().copied())
            .map(header_key)
            .collect();
        match keys.iter().position(|k| wanted.contains(k)) {
            Some(index) => {
                resolved.insert(spec.column, index);
            }
            None if spec.required => missing.push(spec.name.to_string()),
            None => {}
        }
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(FormError::MissingColumns(missing))
    }
}

/// Read a CSV into raw rows for `variant`.
pub fn read_rows(bytes: &[u8], variant: InputVariant) -> Result<RowSet, FormError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let header_refs: Vec<&str> = headers.iter().collect();
    let columns = resolve_columns(&header_refs, variant)?;

    let mut set = RowSet::default();
    for (index, result) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        match result {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |p| p.line());
                if record.iter().all(|cell| cell.trim().is_empty()) {
                    continue;
                }
                let mut row = RawRow::new(line);
                for (column, position) in &columns {
                    row = row.with(*column, record.get(*position).unwrap_or(""));
                }
                set.rows.push(row);
            }
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                set.unreadable.push((line, e.to_string()));
            }
        }
    }

    Ok(set)
}
