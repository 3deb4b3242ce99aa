// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores forecaster weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk file) — one per epoch
//   2. latest_epoch.json            — which epoch was last saved
//   3. best_epoch.json              — epoch with the lowest val_loss
//   4. train_config.json            — data settings + hyperparameters
//
// The config is what lets `test` rebuild the same LstmForecaster
// (input_size, hidden_size, lstm_layers, bidirectional) and the
// same chronological split before loading weights into it.
//
// File naming convention:
//   <run_dir>/checkpoints/
//     model_epoch_1.mpk
//     model_epoch_2.mpk
//     ...
//     latest_epoch.json
//     best_epoch.json
//     train_config.json
//
// CompactRecorder stores half precision, so restored weights match
// the saved ones to roughly three significant digits.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::PathBuf,
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::LstmForecaster;

const LATEST_FILE: &str = "latest_epoch.json";
const BEST_FILE:   &str = "best_epoch.json";
const CONFIG_FILE: &str = "train_config.json";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!(
                "Checkpoint dir '{}' does not exist. Have you run 'train' first?",
                dir.display()
            );
        }
        Ok(Self { dir })
    }

    /// Save model weights for a given epoch and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &LstmForecaster<B>, epoch: usize) -> Result<()> {
        // Recorder appends the extension itself
        let path = self.model_path(epoch);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_epoch(LATEST_FILE, epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Record `epoch` as the best one seen so far.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        self.write_epoch(BEST_FILE, epoch)
    }

    /// Load the best checkpoint, falling back to the latest one.
    pub fn load_model<B: Backend>(
        &self,
        model:  LstmForecaster<B>,
        device: &B::Device,
    ) -> Result<LstmForecaster<B>> {
        let epoch = self.resolve_epoch()?;
        self.load_epoch(model, epoch, device)
    }

    /// The epoch `load_model` restores: best if recorded, else latest.
    pub fn resolve_epoch(&self) -> Result<usize> {
        match self.best_epoch() {
            Ok(epoch) => Ok(epoch),
            Err(_)    => self.latest_epoch(),
        }
    }

    /// Load the weights saved for one specific epoch.
    pub fn load_epoch<B: Backend>(
        &self,
        model:  LstmForecaster<B>,
        epoch:  usize,
        device: &B::Device,
    ) -> Result<LstmForecaster<B>> {
        let path = self.model_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration written by `save_config`.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'test'.",
                    path.display()
                )
            })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_epoch(LATEST_FILE)
    }

    pub fn best_epoch(&self) -> Result<usize> {
        self.read_epoch(BEST_FILE)
    }

    fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    fn write_epoch(&self, file: &str, epoch: usize) -> Result<()> {
        fs::write(self.dir.join(file), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {file}"))
    }

    fn read_epoch(&self, file: &str) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(file))
            .with_context(|| format!("Cannot find '{file}'. Have you run 'train' first?"))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
