// ============================================================
// Layer 3 — SeriesTable Domain Type
// ============================================================
// An in-memory, time-indexed table: one timestamp per row plus
// a fixed set of named numeric columns stored row-major.
//
//   row 0:  2013-01-01 00:00  | energy=0.21 | temp=4.1 | ...
//   row 1:  2013-01-01 00:30  | energy=0.19 | temp=4.0 | ...
//
// Rows are expected in strictly increasing time order.
// Nothing here enforces that; `is_monotonic()` lets callers check.
// A table is never mutated after construction.

use std::ops::Range;

use anyhow::{bail, Result};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    /// Name of the timestamp column in the source data (e.g. "tstp")
    time_column: String,
    /// Names of the numeric columns, in storage order
    columns: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    /// Row-major cells: row r, column c lives at r * columns.len() + c
    values: Vec<f32>,
}

impl SeriesTable {
    pub fn new(
        time_column: impl Into<String>,
        columns:     Vec<String>,
        timestamps:  Vec<NaiveDateTime>,
        values:      Vec<f32>,
    ) -> Result<Self> {
        if columns.is_empty() {
            bail!("a table needs at least one numeric column");
        }
        if values.len() != timestamps.len() * columns.len() {
            bail!(
                "table shape mismatch: {} rows x {} columns needs {} cells, got {}",
                timestamps.len(),
                columns.len(),
                timestamps.len() * columns.len(),
                values.len()
            );
        }
        Ok(Self { time_column: time_column.into(), columns, timestamps, values })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of numeric columns (the timestamp is not counted)
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn timestamp(&self, row: usize) -> NaiveDateTime {
        self.timestamps[row]
    }

    /// All numeric cells of one row
    pub fn row(&self, row: usize) -> &[f32] {
        let w = self.width();
        &self.values[row * w..(row + 1) * w]
    }

    pub fn value(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.width() + col]
    }

    /// Owned copy of a contiguous range of rows
    pub fn rows(&self, range: Range<usize>) -> SeriesTable {
        let w = self.width();
        SeriesTable {
            time_column: self.time_column.clone(),
            columns:     self.columns.clone(),
            timestamps:  self.timestamps[range.clone()].to_vec(),
            values:      self.values[range.start * w..range.end * w].to_vec(),
        }
    }

    /// True when every timestamp is strictly later than the previous one
    pub fn is_monotonic(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] < w[1])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn table(rows: usize) -> SeriesTable {
        let ts = (0..rows).map(|i| start() + Duration::minutes(30 * i as i64)).collect();
        let values = (0..rows).flat_map(|i| [i as f32, 100.0 + i as f32]).collect();
        SeriesTable::new("tstp", vec!["energy".into(), "temp".into()], ts, values).unwrap()
    }

    #[test]
    fn test_row_access_is_row_major() {
        let t = table(3);
        assert_eq!(t.row(1), &[1.0, 101.0]);
        assert_eq!(t.value(2, 1), 102.0);
        assert_eq!(t.column_index("temp"), Some(1));
        assert_eq!(t.column_index("missing"), None);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let ts = vec![start(), start() + Duration::minutes(30)];
        let err = SeriesTable::new("tstp", vec!["energy".into()], ts, vec![1.0]).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_rows_copies_a_contiguous_range() {
        let t = table(5);
        let sub = t.rows(2..4);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.row(0), t.row(2));
        assert_eq!(sub.timestamp(1), t.timestamp(3));
    }

    #[test]
    fn test_monotonic_check() {
        assert!(table(4).is_monotonic());
        let ts = vec![start(), start()];
        let t = SeriesTable::new("tstp", vec!["energy".into()], ts, vec![0.0, 0.0]).unwrap();
        assert!(!t.is_monotonic());
    }
}
