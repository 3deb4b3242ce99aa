// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the training code and its collaborators:
//
//   TableSource      — anything that yields a time-indexed table
//                      (CSV files today)
//   ExperimentLogger — anything that accepts scalar metrics and
//                      image artifacts (a run directory on disk today)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::collections::BTreeMap;

use anyhow::Result;

use crate::domain::table::SeriesTable;

// ─── TableSource ──────────────────────────────────────────────────────────────
/// Any component that can produce the source table.
///
/// Implementations:
///   - CsvTableLoader → reads a CSV file with a timestamp column
pub trait TableSource {
    fn load(&self) -> Result<SeriesTable>;
}

// ─── ExperimentLogger ─────────────────────────────────────────────────────────
/// Receives everything a training run reports.
///
/// Implementations:
///   - RunLogger → metrics.csv + images/*.jpg inside a run directory
///   - (tests)   → in-memory recorders
pub trait ExperimentLogger {
    /// Record a set of named scalars at a global step.
    fn log_metrics(&mut self, step: usize, metrics: &BTreeMap<String, f64>) -> Result<()>;

    /// Record an encoded JPEG image under `tag` at a global step.
    fn log_image(&mut self, tag: &str, step: usize, jpeg: &[u8]) -> Result<()>;
}
