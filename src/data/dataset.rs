// ============================================================
// Layer 4 — Windowed Sequence Dataset
// ============================================================
// Turns a time-indexed table into (input, target) training pairs.
//
// For sample `idx` with window_length = w and target_length = t:
//
//   table rows:   idx ........ idx+w ........ idx+w+t  idx+w+t+1
//                  │── context ──│── horizon ──│
//   x (input):    [idx,           idx+w+t)            labels zeroed
//                                  ▲ in the horizon part
//   y (target):     [idx+1,                 idx+w+t+1)
//
//   - x keeps every numeric column, but label cells in the horizon
//     are set to 0.0 so the model cannot read what it must predict
//   - y is the label column(s) shifted one row ahead of x
//   - the timestamp becomes column 0 of x, rewritten as fractional
//     days since the first row of the window
//
// The dataset shares the table through an Arc and builds every
// sample fresh on access; nothing is cached and the table is never
// modified.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::sync::Arc;

use anyhow::{anyhow, Result};
use burn::data::dataset::Dataset;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::domain::table::SeriesTable;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ─── WindowSpec ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Context rows whose labels stay visible
    pub window_length: usize,
    /// Horizon rows whose labels are masked
    pub target_length: usize,
}

impl WindowSpec {
    pub fn new(window_length: usize, target_length: usize) -> Self {
        Self { window_length, target_length }
    }

    /// Rows in one input window
    pub fn span(&self) -> usize {
        self.window_length + self.target_length
    }

    /// Number of complete samples a table of `rows` rows yields.
    pub fn samples_for(&self, rows: usize) -> usize {
        rows.saturating_sub(self.span() + 1)
    }
}

// ─── WindowRows ───────────────────────────────────────────────────────────────
/// Row-level view of one sample, before conversion to flat arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRows {
    /// Column layout of `x`: the time column first, then the table columns
    pub columns:       Vec<String>,
    /// Label column names, the layout of `y`
    pub label_columns: Vec<String>,
    pub window_length: usize,
    /// Absolute timestamps of the x rows
    pub x_timestamps:  Vec<NaiveDateTime>,
    pub x:             Vec<Vec<f32>>,
    /// Absolute timestamps of the y rows (one step after x)
    pub y_timestamps:  Vec<NaiveDateTime>,
    pub y:             Vec<Vec<f32>>,
}

impl WindowRows {
    pub fn steps(&self) -> usize {
        self.x.len()
    }

    /// Input rows whose labels are visible
    pub fn context(&self) -> &[Vec<f32>] {
        &self.x[..self.window_length]
    }

    /// Input rows whose labels have been masked
    pub fn horizon(&self) -> &[Vec<f32>] {
        &self.x[self.window_length..]
    }
}

// ─── SequenceItem ─────────────────────────────────────────────────────────────
/// Flat, tensor-ready sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceItem {
    /// Row-major [steps, features]
    pub input:    Vec<f32>,
    /// Row-major [steps, labels]; one value per step when there is one label
    pub target:   Vec<f32>,
    pub steps:    usize,
    pub features: usize,
}

// ─── SampleTransform ──────────────────────────────────────────────────────────
/// Applied to every item after it is flattened.
pub trait SampleTransform: Send + Sync {
    fn apply(&self, item: SequenceItem) -> SequenceItem;
}

/// Leaves items untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl SampleTransform for Identity {
    fn apply(&self, item: SequenceItem) -> SequenceItem {
        item
    }
}

impl<F> SampleTransform for F
where
    F: Fn(SequenceItem) -> SequenceItem + Send + Sync,
{
    fn apply(&self, item: SequenceItem) -> SequenceItem {
        self(item)
    }
}

// ─── SequenceDataset ──────────────────────────────────────────────────────────
#[derive(Clone)]
pub struct SequenceDataset {
    table:       Arc<SeriesTable>,
    spec:        WindowSpec,
    label_names: Vec<String>,
    /// Positions of the labels among the table's numeric columns
    label_cols:  Vec<usize>,
    transform:   Arc<dyn SampleTransform>,
}

impl SequenceDataset {
    /// Build an adapter over `table`. Fails if a label name is not a
    /// numeric column of the table.
    pub fn new(table: Arc<SeriesTable>, spec: WindowSpec, label_names: &[String]) -> Result<Self> {
        let label_cols = label_names
            .iter()
            .map(|name| {
                table.column_index(name).ok_or_else(|| {
                    anyhow!("label column '{}' not found in {:?}", name, table.columns())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            table,
            spec,
            label_names: label_names.to_vec(),
            label_cols,
            transform: Arc::new(Identity),
        })
    }

    pub fn with_transform(mut self, transform: Arc<dyn SampleTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn len(&self) -> usize {
        self.spec.samples_for(self.table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spec(&self) -> WindowSpec {
        self.spec
    }

    pub fn table(&self) -> &SeriesTable {
        &self.table
    }

    /// Width of each input row: the time feature plus every numeric column
    pub fn input_width(&self) -> usize {
        1 + self.table.width()
    }

    /// Materialize sample `idx` at row level.
    ///
    /// # Panics
    /// If `idx >= self.len()`, or if the masked horizon is empty or not
    /// all zero after masking. Both mean the caller or the slicing is
    /// broken.
    pub fn window(&self, idx: usize) -> WindowRows {
        let len = self.len();
        assert!(idx < len, "sample index {idx} out of range for dataset of length {len}");

        let w = self.spec.window_length;
        let i = idx;
        let k = idx + self.spec.span();
        let table = &self.table;

        let t0 = table.timestamp(i);
        let mut x: Vec<Vec<f32>> = (i..k)
            .map(|r| {
                let mut row = Vec::with_capacity(self.input_width());
                row.push(elapsed_days(table.timestamp(r) - t0) as f32);
                row.extend_from_slice(table.row(r));
                row
            })
            .collect();

        // Column 0 of x is time, so table column c sits at c + 1
        for row in &mut x[w..] {
            for &c in &self.label_cols {
                row[c + 1] = 0.0;
            }
        }
        let horizon = &x[w..];
        assert!(!horizon.is_empty(), "sample {idx}: masked horizon is empty (target_length = 0)");
        assert!(
            horizon.iter().all(|row| self.label_cols.iter().all(|&c| row[c + 1] == 0.0)),
            "sample {idx}: label cells in the horizon are not zero after masking"
        );

        let y: Vec<Vec<f32>> = (i + 1..k + 1)
            .map(|r| self.label_cols.iter().map(|&c| table.value(r, c)).collect())
            .collect();

        let mut columns = Vec::with_capacity(self.input_width());
        columns.push(table.time_column().to_string());
        columns.extend(table.columns().iter().cloned());

        WindowRows {
            columns,
            label_columns: self.label_names.clone(),
            window_length: w,
            x_timestamps:  table.timestamps()[i..k].to_vec(),
            x,
            y_timestamps:  table.timestamps()[i + 1..k + 1].to_vec(),
            y,
        }
    }

    /// Materialize sample `idx` as flat f32 arrays and run the transform.
    pub fn item(&self, idx: usize) -> SequenceItem {
        let rows = self.window(idx);
        let steps = rows.steps();
        let features = rows.columns.len();

        let item = SequenceItem {
            input:  rows.x.into_iter().flatten().collect(),
            target: rows.y.into_iter().flatten().collect(),
            steps,
            features,
        };
        self.transform.apply(item)
    }
}

impl Dataset<SequenceItem> for SequenceDataset {
    fn get(&self, index: usize) -> Option<SequenceItem> {
        (index < self.len()).then(|| self.item(index))
    }

    fn len(&self) -> usize {
        SequenceDataset::len(self)
    }
}

fn elapsed_days(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / MILLIS_PER_DAY
}
