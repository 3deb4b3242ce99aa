// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the CSV table           (Layer 4 - data)
//   Step 2: Split train/val/test by time (Layer 4 - data)
//   Step 3: Build windowed datasets      (Layer 4 - data)
//   Step 4: Run dir, config, hparams     (Layer 6 - infra)
//   Step 5: Run training loop            (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{SequenceDataset, WindowSpec},
    loader::CsvTableLoader,
    splitter::split_chronological,
};
use crate::domain::{hparams::HParams, table::SeriesTable, traits::TableSource};
use crate::infra::{checkpoint::CheckpointManager, metrics::RunLogger};
use crate::ml::trainer::{run_training, TrainOptions, TrainSummary};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything needed to reproduce a run: where the data lives, how it
// is split, and the hyperparameters. Saved next to the checkpoints so
// `test` can rebuild the same model and the same test split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:           String,
    pub time_column:         String,
    pub label_names:         Vec<String>,
    pub run_dir:             String,
    pub val_fraction:        f64,
    pub test_fraction:       f64,
    pub seed:                u64,
    pub early_stop_patience: usize,
    pub hparams:             HParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:           "data/smartmeter.csv".to_string(),
            time_column:         "tstp".to_string(),
            label_names:         vec!["energy(kWh/hh)".to_string()],
            run_dir:             "runs/lstm".to_string(),
            val_fraction:        0.15,
            test_fraction:       0.15,
            seed:                42,
            early_stop_patience: 3,
            hparams:             HParams::default(),
        }
    }
}

impl TrainConfig {
    pub fn checkpoint_dir(&self) -> PathBuf {
        Path::new(&self.run_dir).join("checkpoints")
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            early_stop_patience: self.early_stop_patience,
            seed:                self.seed,
            ..TrainOptions::new(self.hparams.clone())
        }
    }
}

/// Read a hyperparameter JSON file (same keys `suggest` prints).
pub fn read_hparams(path: impl AsRef<Path>) -> Result<HParams> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read hparams from '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed hparams in '{}'", path.display()))
}

pub fn write_hparams(path: impl AsRef<Path>, hp: &HParams) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_string_pretty(hp)?)
        .with_context(|| format!("Cannot write hparams to '{}'", path.display()))
}

// ─── Datasets ─────────────────────────────────────────────────────────────────
/// The three windowed views over one chronologically split table
pub struct SplitDatasets {
    pub train: SequenceDataset,
    pub val:   SequenceDataset,
    pub test:  SequenceDataset,
}

/// Steps 1–3: load, split, and window the table described by `cfg`.
pub fn load_datasets(cfg: &TrainConfig) -> Result<SplitDatasets> {
    // ── Step 1: Load the CSV table ────────────────────────────────────────────
    tracing::info!("Loading table from '{}'", cfg.data_path);
    let table = CsvTableLoader::new(&cfg.data_path, &cfg.time_column).load()?;

    build_datasets(&table, cfg)
}

/// Steps 2–3 on an already loaded table.
pub fn build_datasets(table: &SeriesTable, cfg: &TrainConfig) -> Result<SplitDatasets> {
    let hp = &cfg.hparams;

    if cfg.label_names.len() != hp.output_size {
        bail!(
            "{} label column(s) given but output_size is {}",
            cfg.label_names.len(),
            hp.output_size
        );
    }
    // Time feature + every numeric column
    if table.width() + 1 != hp.input_size {
        bail!(
            "input_size is {} but the table yields {} features (time + {:?})",
            hp.input_size,
            table.width() + 1,
            table.columns()
        );
    }
    if hp.target_length == 0 {
        bail!("target_length must be at least 1");
    }

    // ── Step 2: Chronological split ───────────────────────────────────────────
    let splits = split_chronological(table, cfg.val_fraction, cfg.test_fraction)?;
    tracing::info!(
        "Split: {} train, {} validation, {} test rows",
        splits.train.len(),
        splits.val.len(),
        splits.test.len()
    );

    // ── Step 3: Windowed datasets ─────────────────────────────────────────────
    // Each split gets its own table so no window can straddle a boundary
    let spec = WindowSpec::new(hp.window_length, hp.target_length);
    let make = |t: SeriesTable| SequenceDataset::new(Arc::new(t), spec, &cfg.label_names);
    let datasets = SplitDatasets {
        train: make(splits.train)?,
        val:   make(splits.val)?,
        test:  make(splits.test)?,
    };

    for (name, ds) in [("train", &datasets.train), ("validation", &datasets.val)] {
        if ds.is_empty() {
            bail!(
                "{name} split is too short for window_length + target_length + 1 = {} rows",
                spec.span() + 1
            );
        }
    }
    tracing::info!(
        "Samples: {} train, {} validation, {} test",
        datasets.train.len(),
        datasets.val.len(),
        datasets.test.len()
    );
    Ok(datasets)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;
        let datasets = load_datasets(cfg)?;

        // ── Step 4: Run directory, logger, checkpoints ────────────────────────
        let (ckpt_manager, mut logger) = prepare_run_dir(cfg)?;

        // ── Step 5: Run training loop (Layer 5) ───────────────────────────────
        let summary = run_training(
            &cfg.train_options(),
            datasets.train,
            datasets.val,
            &ckpt_manager,
            &mut logger,
        )?;

        write_summary(cfg, &summary)?;
        Ok(summary)
    }
}

/// Step 4: create `<run_dir>`, save the config and hparams, open the logger.
pub fn prepare_run_dir(cfg: &TrainConfig) -> Result<(CheckpointManager, RunLogger)> {
    let logger       = RunLogger::new(&cfg.run_dir)?;
    let ckpt_manager = CheckpointManager::new(cfg.checkpoint_dir())?;
    ckpt_manager.save_config(cfg)?;
    write_hparams(Path::new(&cfg.run_dir).join("hparams.json"), &cfg.hparams)?;
    tracing::info!("Run directory: '{}'", cfg.run_dir);
    Ok((ckpt_manager, logger))
}

pub fn write_summary(cfg: &TrainConfig, summary: &TrainSummary) -> Result<()> {
    let path = Path::new(&cfg.run_dir).join("summary.json");
    fs::write(&path, serde_json::to_string_pretty(summary)?)
        .with_context(|| format!("Cannot write summary to '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    /// `rows` half-hourly readings with columns [energy(kWh/hh), temp]
    fn table(rows: usize) -> SeriesTable {
        let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ts = (0..rows).map(|i| start + Duration::minutes(30 * i as i64)).collect();
        let values = (0..rows)
            .flat_map(|i| [(i as f32 * 0.25).sin() * 0.5 + 0.5, 5.0 + (i % 48) as f32 * 0.1])
            .collect();
        SeriesTable::new("tstp", vec!["energy(kWh/hh)".into(), "temp".into()], ts, values).unwrap()
    }

    fn config(run_dir: &Path) -> TrainConfig {
        TrainConfig {
            run_dir: run_dir.to_string_lossy().into_owned(),
            hparams: HParams {
                window_length: 4,
                target_length: 2,
                hidden_size:   4,
                lstm_layers:   1,
                lstm_dropout:  0.0,
                batch_size:    4,
                num_workers:   0,
                vis_i:         2,
                input_size:    3,
                max_nb_epochs: 1,
                ..HParams::default()
            },
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_build_datasets_splits_in_time_order() {
        let dir = tempfile::tempdir().unwrap();
        let ds  = build_datasets(&table(100), &config(dir.path())).unwrap();
        // 70 / 15 / 15 rows, minus span + 1 = 7 rows each
        assert_eq!(ds.train.len(), 63);
        assert_eq!(ds.val.len(), 8);
        assert_eq!(ds.test.len(), 8);
        let last_train = ds.train.table().timestamps().last().copied().unwrap();
        assert!(last_train < ds.val.table().timestamp(0));
    }

    #[test]
    fn test_input_size_must_match_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.hparams.input_size = 6;
        let err = build_datasets(&table(100), &cfg).err().unwrap();
        assert!(err.to_string().contains("input_size is 6"));
    }

    #[test]
    fn test_label_count_must_match_output_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.label_names.push("temp".to_string());
        assert!(build_datasets(&table(100), &cfg).is_err());
    }

    #[test]
    fn test_short_validation_split_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_datasets(&table(30), &config(dir.path())).err().unwrap();
        assert!(err.to_string().contains("validation split is too short"));
    }

    #[test]
    fn test_prepare_run_dir_persists_config_and_hparams() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let (ckpt, _logger) = prepare_run_dir(&cfg).unwrap();

        let restored = ckpt.load_config().unwrap();
        assert_eq!(restored.hparams, cfg.hparams);
        assert_eq!(restored.label_names, cfg.label_names);
        assert_eq!(read_hparams(dir.path().join("hparams.json")).unwrap(), cfg.hparams);
        assert!(dir.path().join("metrics.csv").exists());
    }
}
