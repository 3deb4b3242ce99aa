// ============================================================
// Layer 6 — Run Logger
// ============================================================
// File-based ExperimentLogger. One run directory holds:
//
//   <run_dir>/
//     metrics.csv          ← every scalar, one row each
//     images/
//       val_image_120.jpg  ← tag "val/image" at global step 120
//
// Example metrics.csv:
//   step,name,value
//   120,train_loss,0.041532
//   120,val_loss,0.052210
//   120,lr,0.001000
//
// Long format (step,name,value) lets new metric names appear
// mid-run without rewriting the header.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::traits::ExperimentLogger;

/// Summary of one finished epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean masked MSE over all training batches
    pub train_loss: f64,

    /// Mean masked MSE on the validation split
    pub val_loss: f64,

    /// Learning rate used during this epoch
    pub lr: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, lr: f64) -> Self {
        Self { epoch, train_loss, val_loss, lr }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Writes scalars and JPEG images into a run directory.
pub struct RunLogger {
    csv_path:   PathBuf,
    images_dir: PathBuf,
}

impl RunLogger {
    /// Create the run directory layout.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(run_dir: impl AsRef<Path>) -> Result<Self> {
        let run_dir    = run_dir.as_ref();
        let images_dir = run_dir.join("images");
        fs::create_dir_all(&images_dir)
            .with_context(|| format!("Cannot create run directory '{}'", run_dir.display()))?;

        let csv_path = run_dir.join("metrics.csv");

        // Appending across runs into the same directory is allowed
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "step,name,value")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, images_dir })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// File name for an image tag: "val/image" at step 7 → "val_image_7.jpg"
    fn image_path(&self, tag: &str, step: usize) -> PathBuf {
        let stem: String = tag
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.images_dir.join(format!("{stem}_{step}.jpg"))
    }
}

impl ExperimentLogger for RunLogger {
    fn log_metrics(&mut self, step: usize, metrics: &BTreeMap<String, f64>) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        for (name, value) in metrics {
            writeln!(f, "{step},{name},{value}")?;
        }
        Ok(())
    }

    fn log_image(&mut self, tag: &str, step: usize, jpeg: &[u8]) -> Result<()> {
        let path = self.image_path(tag, step);
        fs::write(&path, jpeg)
            .with_context(|| format!("Cannot write image '{}'", path.display()))?;
        tracing::debug!("Saved image '{}'", path.display());
        Ok(())
    }
}

// ─── In-memory logger for tests ───────────────────────────────────────────────
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLogger {
    pub scalars: Vec<(usize, String, f64)>,
    pub images:  Vec<(String, usize, usize)>,
}

#[cfg(test)]
impl MemoryLogger {
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.scalars
            .iter()
            .filter(|(_, n, _)| n == name)
            .map(|(_, _, v)| *v)
            .collect()
    }
}

#[cfg(test)]
impl ExperimentLogger for MemoryLogger {
    fn log_metrics(&mut self, step: usize, metrics: &BTreeMap<String, f64>) -> Result<()> {
        for (k, v) in metrics {
            self.scalars.push((step, k.clone(), *v));
        }
        Ok(())
    }

    fn log_image(&mut self, tag: &str, step: usize, jpeg: &[u8]) -> Result<()> {
        self.images.push((tag.to_string(), step, jpeg.len()));
        Ok(())
    }
}
