//! Reshaping option histories for display.
//!
//! Histories fetched for different expirations are labelled, concatenated
//! and then pivoted so each expiration becomes one chart series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::DataError;
use crate::domain::{Expiration, OptionEod, StockBar};

/// Which option column the charts plot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataField {
    #[default]
    Price,
    Volume,
}

impl DataField {
    pub fn label(self) -> &'static str {
        match self {
            DataField::Price => "Price",
            DataField::Volume => "Volume",
        }
    }

    /// Underlying row column.
    pub fn column(self) -> &'static str {
        match self {
            DataField::Price => "close",
            DataField::Volume => "volume",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            DataField::Price => DataField::Volume,
            DataField::Volume => DataField::Price,
        }
    }

    pub fn value(self, row: &OptionEod) -> f64 {
        match self {
            DataField::Price => row.close,
            DataField::Volume => row.volume as f64,
        }
    }
}

/// An option EOD row tagged with the expiration it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledEod {
    pub expiration: Expiration,
    pub row: OptionEod,
}

/// Concatenated, labelled option history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionHistory {
    rows: Vec<LabeledEod>,
}

impl OptionHistory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach `exp` to every row.
    pub fn label(exp: Expiration, rows: Vec<OptionEod>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| LabeledEod {
                    expiration: exp,
                    row,
                })
                .collect(),
        }
    }

    /// Primary rows followed by secondary rows. An empty primary yields an
    /// empty history: the secondary expiration is never shown alone.
    pub fn combine(primary: OptionHistory, secondary: Option<OptionHistory>) -> OptionHistory {
        if primary.is_empty() {
            return OptionHistory::empty();
        }
        let mut rows = primary.rows;
        if let Some(secondary) = secondary {
            rows.extend(secondary.rows);
        }
        OptionHistory { rows }
    }

    pub fn rows(&self) -> &[LabeledEod] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct expirations in first-seen order.
    pub fn expirations(&self) -> Vec<Expiration> {
        let mut seen = Vec::new();
        for r in &self.rows {
            if !seen.contains(&r.expiration) {
                seen.push(r.expiration);
            }
        }
        seen
    }

    /// Rows grouped by expiration, in first-seen order, each group sorted by
    /// date.
    pub fn split_by_expiration(&self) -> Vec<(Expiration, Vec<OptionEod>)> {
        self.expirations()
            .into_iter()
            .map(|exp| {
                let mut rows: Vec<OptionEod> = self
                    .rows
                    .iter()
                    .filter(|r| r.expiration == exp)
                    .map(|r| r.row.clone())
                    .collect();
                rows.sort_by_key(|r| r.date);
                (exp, rows)
            })
            .collect()
    }

    /// Wide table: one row per date, one column per expiration label.
    /// Duplicate (date, label) rows are averaged.
    pub fn pivot(&self, field: DataField) -> PivotTable {
        let mut sums: BTreeMap<(NaiveDate, Expiration), (f64, usize)> = BTreeMap::new();
        for r in &self.rows {
            let entry = sums.entry((r.row.date, r.expiration)).or_insert((0.0, 0));
            entry.0 += field.value(&r.row);
            entry.1 += 1;
        }

        let index: Vec<NaiveDate> = self
            .rows
            .iter()
            .map(|r| r.row.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: Vec<Expiration> = self
            .rows
            .iter()
            .map(|r| r.expiration)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let cells = index
            .iter()
            .map(|date| {
                columns
                    .iter()
                    .map(|exp| {
                        sums.get(&(*date, *exp))
                            .map(|(sum, n)| sum / *n as f64)
                    })
                    .collect()
            })
            .collect();

        PivotTable {
            field,
            index,
            columns,
            cells,
        }
    }

    /// Long-format polars frame with an `expiration` label column.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let col_f64 = |name: &str, f: fn(&OptionEod) -> f64| {
            Column::new(name.into(), self.rows.iter().map(|r| f(&r.row)).collect::<Vec<f64>>())
        };
        let col_u64 = |name: &str, f: fn(&OptionEod) -> u64| {
            Column::new(name.into(), self.rows.iter().map(|r| f(&r.row)).collect::<Vec<u64>>())
        };
        DataFrame::new(vec![
            Column::new(
                "date".into(),
                self.rows
                    .iter()
                    .map(|r| r.row.date.to_string())
                    .collect::<Vec<String>>(),
            ),
            Column::new(
                "expiration".into(),
                self.rows
                    .iter()
                    .map(|r| r.expiration.label())
                    .collect::<Vec<String>>(),
            ),
            col_f64("open", |r| r.open),
            col_f64("high", |r| r.high),
            col_f64("low", |r| r.low),
            col_f64("close", |r| r.close),
            col_u64("volume", |r| r.volume),
            col_u64("count", |r| r.count),
            col_f64("bid", |r| r.bid),
            col_f64("ask", |r| r.ask),
        ])
        .map_err(|e| DataError::Other(format!("dataframe creation: {e}")))
    }
}

/// Date-indexed table with one column per expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub field: DataField,
    pub index: Vec<NaiveDate>,
    pub columns: Vec<Expiration>,
    /// `cells[row][col]`; `None` where that expiration has no row that day.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(|e| e.label()).collect()
    }

    /// Present `(date, value)` points of one column.
    pub fn column_series(&self, col: usize) -> Vec<(NaiveDate, f64)> {
        self.index
            .iter()
            .zip(&self.cells)
            .filter_map(|(date, row)| row.get(col).copied().flatten().map(|v| (*date, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Wide polars frame: `date` plus one nullable column per label.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let mut columns = vec![Column::new(
            "date".into(),
            self.index.iter().map(|d| d.to_string()).collect::<Vec<String>>(),
        )];
        for (i, exp) in self.columns.iter().enumerate() {
            let values: Vec<Option<f64>> = self.cells.iter().map(|row| row[i]).collect();
            columns.push(Column::new(exp.label().into(), values));
        }
        DataFrame::new(columns).map_err(|e| DataError::Other(format!("dataframe creation: {e}")))
    }
}

/// Downloaded stock quotes with the company name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockQuotes {
    pub long_name: Option<String>,
    pub bars: Vec<StockBar>,
}

impl StockQuotes {
    /// Close of the last bar, or 0.0 when there are no bars.
    pub fn latest_close(&self) -> f64 {
        self.bars.last().map(|b| b.close).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
