//! Short-term / long-term partitioning and fixed-size pagination

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::record::TransactionRecord;

/// Rows on one Form 8949 page.
pub const PAGE_CAPACITY: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Part I, holding period of one year or less.
    ShortTerm,
    /// Part II, holding period of more than one year.
    LongTerm,
}

impl Partition {
    pub fn of(record: &TransactionRecord) -> Self {
        if record.is_short_term {
            Partition::ShortTerm
        } else {
            Partition::LongTerm
        }
    }

    /// Zero-based page of the base document this partition is drawn on.
    pub fn template_page_index(self) -> usize {
        match self {
            Partition::ShortTerm => 0,
            Partition::LongTerm => 1,
        }
    }

    /// Label used in output filenames.
    pub fn file_label(self) -> &'static str {
        match self {
            Partition::ShortTerm => "Part_I_Short_Term",
            Partition::LongTerm => "Part_II_Long_Term",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Partition::ShortTerm => "Part I - Short-Term",
            Partition::LongTerm => "Part II - Long-Term",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Split records into `(short_term, long_term)`, keeping input order.
pub fn partition(
    records: Vec<TransactionRecord>,
) -> (Vec<TransactionRecord>, Vec<TransactionRecord>) {
    records.into_iter().partition(|r| r.is_short_term)
}

/// A bounded, ordered slice of one partition.
#[derive(Debug, PartialEq)]
pub struct PageGroup<'a, T = TransactionRecord> {
    pub items: &'a [T],
    /// 1-based.
    pub number: usize,
    pub page_count: usize,
}

impl<T> Clone for PageGroup<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PageGroup<'_, T> {}

impl<T> PageGroup<'_, T> {
    /// The last group of its partition carries the totals.
    pub fn is_final(&self) -> bool {
        self.number == self.page_count
    }
}

/// Split `items` into groups of at most `capacity`. No items, no groups.
pub fn paginate<T>(items: &[T], capacity: usize) -> Result<Vec<PageGroup<'_, T>>, FormError> {
    if capacity == 0 {
        return Err(FormError::Layout("Page capacity must be at least 1".into()));
    }

    let page_count = items.len().div_ceil(capacity);
    Ok(items
        .chunks(capacity)
        .enumerate()
        .map(|(i, chunk)| PageGroup {
            items: chunk,
            number: i + 1,
            page_count,
        })
        .collect())
}

/// Column sums over a whole partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub proceeds: Decimal,
    pub cost_basis: Decimal,
    pub adjustment: Decimal,
    pub gain_loss: Decimal,
}

impl Totals {
    /// Fails when a column sum leaves the `Decimal` range.
    pub fn of(records: &[TransactionRecord]) -> Result<Self, FormError> {
        records.iter().try_fold(Totals::default(), |acc, r| {
            acc.checked_add(&Totals {
                proceeds: r.proceeds,
                cost_basis: r.cost_basis,
                adjustment: r.adjustment,
                gain_loss: r.gain_loss,
            })
            .ok_or_else(|| {
                FormError::Overflow(format!("column totals overflow at {}", r.description))
            })
        })
    }

    pub fn checked_add(&self, other: &Totals) -> Option<Totals> {
        Some(Totals {
            proceeds: self.proceeds.checked_add(other.proceeds)?,
            cost_basis: self.cost_basis.checked_add(other.cost_basis)?,
            adjustment: self.adjustment.checked_add(other.adjustment)?,
            gain_loss: self.gain_loss.checked_add(other.gain_loss)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(n: i64, short: bool) -> TransactionRecord {
        let acquired = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let days = if short { 30 } else { 400 };
        TransactionRecord::computed(
            format!("lot {}", n),
            acquired,
            acquired + chrono::Duration::days(days),
            Decimal::new(n * 100, 0),
            Decimal::new(n * 40, 0),
        )
    }

    #[test]
    fn test_partition_is_stable_and_total() {
        let records: Vec<_> = (0..6).map(|n| record(n, n % 3 != 0)).collect();
        let (short, long) = partition(records.clone());
        assert_eq!(short.len() + long.len(), records.len());
        let short_names: Vec<_> = short.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(short_names, vec!["lot 1", "lot 2", "lot 4", "lot 5"]);
        let long_names: Vec<_> = long.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(long_names, vec!["lot 0", "lot 3"]);
    }

    #[test]
    fn test_paginate_fifteen_gives_fourteen_and_one() {
        let items: Vec<u32> = (0..15).collect();
        let pages = paginate(&items, PAGE_CAPACITY).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].items.len(), 14);
        assert_eq!(pages[1].items, &[14]);
        assert!(!pages[0].is_final());
        assert!(pages[1].is_final());
        assert_eq!(pages[1].page_count, 2);
    }

    #[test]
    fn test_paginate_empty_gives_no_groups() {
        let items: Vec<u32> = Vec::new();
        assert!(paginate(&items, PAGE_CAPACITY).unwrap().is_empty());
    }

    #[test]
    fn test_paginate_exact_multiple() {
        let items: Vec<u32> = (0..28).collect();
        let pages = paginate(&items, PAGE_CAPACITY).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].items.len(), 14);
    }

    #[test]
    fn test_paginate_zero_capacity_fails() {
        let items = [1, 2, 3];
        assert!(paginate(&items, 0).is_err());
    }

    #[test]
    fn test_totals_cover_whole_partition() {
        let records: Vec<_> = (1..=20).map(|n| record(n, true)).collect();
        let pages = paginate(&records, PAGE_CAPACITY).unwrap();
        let last_page_only = Totals::of(pages[1].items).unwrap();
        let all = Totals::of(&records).unwrap();
        assert_eq!(all.proceeds, Decimal::new(21_000, 0));
        assert_eq!(all.gain_loss, Decimal::new(12_600, 0));
        assert_ne!(last_page_only, all);
    }

    #[test]
    fn test_totals_overflow_is_an_error() {
        let mut big = record(1, true);
        big.proceeds = Decimal::MAX;
        let records = vec![big.clone(), big];
        assert!(matches!(Totals::of(&records), Err(FormError::Overflow(_))));
    }

    #[test]
    fn test_template_pages() {
        assert_eq!(Partition::ShortTerm.template_page_index(), 0);
        assert_eq!(Partition::LongTerm.template_page_index(), 1);
        assert_eq!(Partition::of(&record(1, false)), Partition::LongTerm);
    }
}
