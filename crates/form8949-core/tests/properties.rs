//! Property tests for partitioning, pagination and amount normalization

use chrono::{Duration, NaiveDate};
use form8949_core::normalize::{parse_amount, try_parse_amount};
use form8949_core::partition::{paginate, partition, Totals};
use form8949_core::render::format_money;
use form8949_core::TransactionRecord;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn record(index: usize, holding_days: i64, cents: i64) -> TransactionRecord {
    let acquired = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
    TransactionRecord::computed(
        format!("lot {}", index),
        acquired,
        acquired + Duration::days(holding_days),
        Decimal::new(cents, 2),
        Decimal::new(cents / 2, 2),
    )
}

fn records() -> impl Strategy<Value = Vec<TransactionRecord>> {
    prop::collection::vec((0i64..900, -1_000_000i64..1_000_000), 0..60).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (days, cents))| record(i, days, cents))
            .collect()
    })
}

proptest! {
    /// Property: every record lands in exactly one partition, in input order
    #[test]
    fn partition_is_total_and_stable(input in records()) {
        let (short, long) = partition(input.clone());
        prop_assert_eq!(short.len() + long.len(), input.len());
        prop_assert!(short.iter().all(|r| r.holding_days <= 365 && r.is_short_term));
        prop_assert!(long.iter().all(|r| r.holding_days > 365 && !r.is_short_term));

        let expected_short: Vec<_> = input.iter().filter(|r| r.is_short_term).cloned().collect();
        prop_assert_eq!(short, expected_short);
    }

    /// Property: concatenating the page groups gives back the input
    #[test]
    fn pagination_preserves_order(len in 0usize..100, capacity in 1usize..20) {
        let items: Vec<usize> = (0..len).collect();
        let groups = paginate(&items, capacity).unwrap();

        let flattened: Vec<usize> = groups.iter().flat_map(|g| g.items.iter().copied()).collect();
        prop_assert_eq!(&flattened, &items);
        prop_assert_eq!(groups.len(), len.div_ceil(capacity));
        for (i, group) in groups.iter().enumerate() {
            prop_assert!(!group.items.is_empty());
            prop_assert!(group.items.len() <= capacity);
            prop_assert_eq!(group.number, i + 1);
            prop_assert_eq!(group.is_final(), i + 1 == groups.len());
        }
    }

    /// Property: totals equal the sum over page totals
    #[test]
    fn totals_are_additive_over_pages(input in records()) {
        let groups = paginate(&input, 14).unwrap();
        let summed = groups
            .iter()
            .map(|g| Totals::of(g.items).unwrap())
            .try_fold(Totals::default(), |acc, t| acc.checked_add(&t))
            .unwrap();
        prop_assert_eq!(summed, Totals::of(&input).unwrap());
    }

    /// Property: formatted amounts parse back to the rounded value
    #[test]
    fn formatted_amounts_normalize(cents in -100_000_000_000i64..100_000_000_000) {
        let value = Decimal::new(cents, 2);
        let text = format_money(value, 2);
        prop_assert_eq!(parse_amount(&text), value);
        prop_assert_eq!(parse_amount(&format!("${}", text)), value);
    }

    /// Property: the lenient parser never panics and agrees with the strict one
    #[test]
    fn lenient_parser_is_total(input in "\\PC{0,24}") {
        let lenient = parse_amount(&input);
        if let Ok(strict) = try_parse_amount(&input) {
            prop_assert_eq!(lenient, strict);
        } else {
            prop_assert_eq!(lenient, Decimal::ZERO);
        }
    }
}
