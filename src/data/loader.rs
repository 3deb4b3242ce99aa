// ============================================================
// Layer 4 — CSV Table Loader
// ============================================================
// Reads a smart-meter CSV file into a SeriesTable.
//
// Expected layout (header row required):
//
//   tstp,energy(kWh/hh),visibility,temperature,humidity,windSpeed
//   2013-01-01 00:00:00.0000000,0.219,12.3,4.1,0.93,3.2
//   2013-01-01 00:30:00.0000000,0.241,12.1,4.0,0.93,3.0
//
// One column (configurable, "tstp" by default) holds timestamps;
// every other column must be numeric. Rows with an empty or
// "Null" cell are dropped with a warning, since the export marks
// missing meter readings that way. Any other unparsable cell is
// an error.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime};

use crate::domain::table::SeriesTable;
use crate::domain::traits::TableSource;

/// Timestamp layouts accepted in the time column, tried in order
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub struct CsvTableLoader {
    path:        PathBuf,
    time_column: String,
}

impl CsvTableLoader {
    pub fn new(path: impl Into<PathBuf>, time_column: impl Into<String>) -> Self {
        Self { path: path.into(), time_column: time_column.into() }
    }
}

impl TableSource for CsvTableLoader {
    fn load(&self) -> Result<SeriesTable> {
        let table = read_csv(&self.path, &self.time_column)?;

        if !table.is_monotonic() {
            tracing::warn!(
                "Timestamps in '{}' are not strictly increasing; windows may span gaps",
                self.path.display()
            );
        }
        tracing::info!(
            "Loaded {} rows x {} columns from '{}'",
            table.len(),
            table.width(),
            self.path.display()
        );
        Ok(table)
    }
}

fn read_csv(path: &Path, time_column: &str) -> Result<SeriesTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;

    let headers = reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h == time_column)
        .ok_or_else(|| anyhow!("'{}' has no time column '{}'", path.display(), time_column))?;

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(_, h)| h.to_string())
        .collect();
    if columns.is_empty() {
        bail!("'{}' has no numeric columns besides '{}'", path.display(), time_column);
    }

    let mut timestamps = Vec::new();
    let mut values     = Vec::new();
    let mut skipped    = 0usize;
    let mut row        = Vec::with_capacity(columns.len());

    for (line, record) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line_no = line + 2;
        let record = record.with_context(|| format!("Bad CSV record at line {line_no}"))?;

        row.clear();
        let mut missing = false;
        for (i, cell) in record.iter().enumerate() {
            if i == time_idx {
                continue;
            }
            if cell.is_empty() || cell.eq_ignore_ascii_case("null") {
                missing = true;
                break;
            }
            let v: f32 = cell.parse().with_context(|| {
                format!("Line {line_no}, column '{}': '{cell}' is not a number", &headers[i])
            })?;
            if !v.is_finite() {
                bail!("Line {line_no}, column '{}': '{cell}' is not a finite reading", &headers[i]);
            }
            row.push(v);
        }
        if missing {
            skipped += 1;
            continue;
        }

        let ts = parse_timestamp(&record[time_idx])
            .with_context(|| format!("Line {line_no}: bad timestamp"))?;
        timestamps.push(ts);
        values.extend_from_slice(&row);
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} rows with missing readings in '{}'", skipped, path.display());
    }

    SeriesTable::new(time_column, columns, timestamps, values)
}

/// Parse one timestamp cell. RFC 3339 values are converted to naive UTC.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .map_err(|_| anyhow!("'{s}' does not match any supported timestamp format"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_loads_columns_and_rows() {
        let f = write_csv(
            "tstp,energy(kWh/hh),temperature\n\
             2013-01-01 00:00:00.0000000,0.5,4.0\n\
             2013-01-01 00:30:00.0000000,0.25,3.5\n",
        );
        let table = CsvTableLoader::new(f.path(), "tstp").load().unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns(), &["energy(kWh/hh)".to_string(), "temperature".to_string()]);
        assert_eq!(table.row(1), &[0.25, 3.5]);
        assert_eq!(table.time_column(), "tstp");
    }

    #[test]
    fn test_time_column_may_be_anywhere() {
        let f = write_csv("a,tstp,b\n1,2013-01-01T00:00:00,2\n");
        let table = CsvTableLoader::new(f.path(), "tstp").load().unwrap();
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.row(0), &[1.0, 2.0]);
    }

    #[test]
    fn test_null_rows_are_skipped() {
        let f = write_csv(
            "tstp,energy\n\
             2013-01-01 00:00:00,0.5\n\
             2013-01-01 00:30:00,Null\n\
             2013-01-01 01:00:00,0.7\n",
        );
        let table = CsvTableLoader::new(f.path(), "tstp").load().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, 0), 0.7);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let f = write_csv("tstp,energy\n2013-01-01 00:00:00,abc\n");
        let err = CsvTableLoader::new(f.path(), "tstp").load().unwrap_err();
        assert!(format!("{err:#}").contains("not a number"));
    }

    #[test]
    fn test_non_finite_readings_are_rejected() {
        for cell in ["NaN", "inf", "-inf"] {
            let f = write_csv(&format!(
                "tstp,energy,temp\n2013-01-01 00:00:00,1,2\n2013-01-01 00:30:00,0.5,{cell}\n"
            ));
            let err = CsvTableLoader::new(f.path(), "tstp").load().unwrap_err();
            let msg = format!("{err:#}");
            assert!(msg.contains("Line 3, column 'temp'"), "{msg}");
            assert!(msg.contains("not a finite reading"), "{msg}");
        }
    }

    #[test]
    fn test_missing_time_column_is_an_error() {
        let f = write_csv("time,energy\n2013-01-01 00:00:00,1\n");
        assert!(CsvTableLoader::new(f.path(), "tstp").load().is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2013-01-01 12:30:00.0000000").unwrap();
        let b = parse_timestamp("2013-01-01T12:30:00").unwrap();
        let c = parse_timestamp("2013-01-01T12:30:00+00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
