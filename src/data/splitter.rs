// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Cuts one time-indexed table into three consecutive pieces:
//
//   |──────── train ────────|── validation ──|──── test ────|
//   oldest rows                                  newest rows
//
// Unlike a shuffled split, every validation row is later than
// every training row and every test row is later still, so the
// model is always scored on a future it has not seen.
//
// Split ratio: 70% / 15% / 15% by default (configurable)

use anyhow::{bail, Result};

use crate::domain::table::SeriesTable;

#[derive(Debug, Clone)]
pub struct TableSplits {
    pub train: SeriesTable,
    pub val:   SeriesTable,
    pub test:  SeriesTable,
}

/// Split `table` chronologically.
///
/// # Arguments
/// * `val_fraction`  - Proportion of rows for validation, e.g. 0.15
/// * `test_fraction` - Proportion of rows for testing, e.g. 0.15
///
/// Training receives whatever remains at the start of the table.
pub fn split_chronological(
    table:         &SeriesTable,
    val_fraction:  f64,
    test_fraction: f64,
) -> Result<TableSplits> {
    if !(0.0..1.0).contains(&val_fraction)
        || !(0.0..1.0).contains(&test_fraction)
        || val_fraction + test_fraction >= 1.0
    {
        bail!(
            "invalid split fractions: val={val_fraction}, test={test_fraction} \
             (each in [0, 1) and together below 1)"
        );
    }

    let total    = table.len();
    let n_test   = ((total as f64) * test_fraction).round() as usize;
    let n_val    = ((total as f64) * val_fraction).round() as usize;
    let test_at  = total - n_test.min(total);
    let val_at   = test_at - n_val.min(test_at);

    let splits = TableSplits {
        train: table.rows(0..val_at),
        val:   table.rows(val_at..test_at),
        test:  table.rows(test_at..total),
    };

    tracing::debug!(
        "Dataset split: {} train, {} validation, {} test rows",
        splits.train.len(),
        splits.val.len(),
        splits.test.len(),
    );

    Ok(splits)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn table(rows: usize) -> SeriesTable {
        let t0 = NaiveDate::from_ymd_opt(2014, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ts = (0..rows).map(|i| t0 + Duration::minutes(30 * i as i64)).collect();
        let values = (0..rows).map(|i| i as f32).collect();
        SeriesTable::new("tstp", vec!["energy".into()], ts, values).unwrap()
    }

    #[test]
    fn test_correct_split_sizes() {
        let s = split_chronological(&table(100), 0.15, 0.15).unwrap();
        assert_eq!(s.train.len(), 70);
        assert_eq!(s.val.len(),   15);
        assert_eq!(s.test.len(),  15);
    }

    #[test]
    fn test_order_is_preserved() {
        let s = split_chronological(&table(20), 0.25, 0.25).unwrap();
        let last_train = s.train.timestamp(s.train.len() - 1);
        assert!(last_train < s.val.timestamp(0));
        assert!(s.val.timestamp(s.val.len() - 1) < s.test.timestamp(0));
        assert_eq!(s.val.value(0, 0), 10.0);
    }

    #[test]
    fn test_all_rows_preserved() {
        let s = split_chronological(&table(37), 0.2, 0.1).unwrap();
        assert_eq!(s.train.len() + s.val.len() + s.test.len(), 37);
    }

    #[test]
    fn test_empty_table() {
        let s = split_chronological(&table(0), 0.15, 0.15).unwrap();
        assert!(s.train.is_empty() && s.val.is_empty() && s.test.is_empty());
    }

    #[test]
    fn test_fractions_must_leave_training_rows() {
        assert!(split_chronological(&table(10), 0.5, 0.5).is_err());
        assert!(split_chronological(&table(10), -0.1, 0.2).is_err());
    }
}
