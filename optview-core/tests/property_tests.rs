//! Property tests for the option-history reshaping.
//!
//! 1. Combining two non-empty histories keeps every row
//! 2. Pivoting yields one column per distinct expiration label
//! 3. Every pivot cell is backed by at least one source row
//! 4. Latest close of an empty quote set is zero

use chrono::{Duration, NaiveDate};
use optview_core::domain::{Expiration, OptionEod};
use optview_core::frame::{DataField, OptionHistory, StockQuotes};
use proptest::prelude::*;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

// ── Strategies ───────────────────────────────────────────────────────

fn arb_row() -> impl Strategy<Value = OptionEod> {
    (0i64..60, 0.05..50.0_f64, 0u64..5_000).prop_map(|(day, close, volume)| OptionEod {
        date: base() + Duration::days(day),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        count: volume / 10,
        bid: close,
        ask: close,
    })
}

fn arb_rows() -> impl Strategy<Value = Vec<OptionEod>> {
    prop::collection::vec(arb_row(), 1..40)
}

fn arb_expiration() -> impl Strategy<Value = Expiration> {
    (0i64..400).prop_map(|d| Expiration(base() + Duration::days(d)))
}

proptest! {
    #[test]
    fn combined_row_count_is_sum(
        p_exp in arb_expiration(),
        s_exp in arb_expiration(),
        primary in arb_rows(),
        secondary in arb_rows(),
    ) {
        let expected = primary.len() + secondary.len();
        let combined = OptionHistory::combine(
            OptionHistory::label(p_exp, primary),
            Some(OptionHistory::label(s_exp, secondary)),
        );
        prop_assert_eq!(combined.len(), expected);
    }

    #[test]
    fn pivot_has_one_column_per_label(
        groups in prop::collection::vec((arb_expiration(), arb_rows()), 1..5),
    ) {
        let mut histories = groups
            .iter()
            .map(|(exp, rows)| OptionHistory::label(*exp, rows.clone()));
        let first = histories.next().unwrap();
        let combined = histories.fold(first, |acc, h| OptionHistory::combine(acc, Some(h)));

        let mut labels: Vec<String> = groups.iter().map(|(e, _)| e.label()).collect();
        labels.sort();
        labels.dedup();

        for field in [DataField::Price, DataField::Volume] {
            let table = combined.pivot(field);
            prop_assert_eq!(table.columns.len(), labels.len());
            prop_assert_eq!(table.column_labels(), labels.clone());
            prop_assert!(table.cells.iter().all(|row| row.len() == labels.len()));
        }
    }

    #[test]
    fn pivot_cells_are_backed_by_rows(exp in arb_expiration(), rows in arb_rows()) {
        let history = OptionHistory::label(exp, rows.clone());
        let table = history.pivot(DataField::Price);
        let mut dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        dates.sort();
        dates.dedup();
        prop_assert_eq!(&table.index, &dates);
        // single expiration: every date has a value
        prop_assert!(table.cells.iter().all(|row| row[0].is_some()));
        prop_assert_eq!(table.column_series(0).len(), dates.len());
    }
}

#[test]
fn empty_quotes_latest_close_is_zero() {
    let quotes = StockQuotes::default();
    assert!(quotes.is_empty());
    assert_eq!(quotes.latest_close(), 0.0);
}
