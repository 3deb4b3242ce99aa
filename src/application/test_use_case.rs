// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Scores a finished run on its held-out test split:
//
//   Step 1: Read train_config.json      (Layer 6 - infra)
//   Step 2: Rebuild the same splits     (Layer 4 - data)
//   Step 3: Rebuild + restore the model (Layer 5/6)
//   Step 4: Evaluation pass             (Layer 5 - ml)
//
// The test pass is the validation pass under another name:
// it logs "test_loss" and the chart "test/image".

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::application::train_use_case::load_datasets;
use crate::domain::traits::ExperimentLogger;
use crate::infra::{checkpoint::CheckpointManager, metrics::RunLogger};
use crate::ml::evaluator::{eval_steps, validation_end, EvalReport};
use crate::ml::model::{ForecasterConfig, LstmForecaster};
use crate::ml::trainer::MyInnerBackend;

pub struct TestUseCase {
    run_dir: PathBuf,
}

impl TestUseCase {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self { run_dir: run_dir.into() }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let mut logger = RunLogger::new(&self.run_dir)?;
        evaluate_run::<MyInnerBackend>(&self.run_dir, &mut logger, &device)
    }
}

/// Evaluate the checkpoint stored under `run_dir` on its test split.
pub fn evaluate_run<B: Backend>(
    run_dir: &Path,
    logger:  &mut dyn ExperimentLogger,
    device:  &B::Device,
) -> Result<EvalReport> {
    // ── Step 1: Config ────────────────────────────────────────────────────────
    let ckpt = CheckpointManager::open(run_dir.join("checkpoints"))?;
    let cfg  = ckpt.load_config()?;
    let hp   = &cfg.hparams;

    // ── Step 2: Same split as training ────────────────────────────────────────
    let datasets = load_datasets(&cfg)?;
    if datasets.test.is_empty() {
        bail!(
            "test split has no complete window (needs {} rows)",
            hp.span() + 1
        );
    }

    // ── Step 3: Model ─────────────────────────────────────────────────────────
    let epoch = ckpt.resolve_epoch()?;
    let model: LstmForecaster<B> = ForecasterConfig::from_hparams(hp).init(device);
    let model = ckpt.load_epoch(model, epoch, device)?;

    // ── Step 4: Evaluation pass ───────────────────────────────────────────────
    let records = eval_steps(&model, datasets.test.clone(), hp.batch_size, "test", device);
    validation_end(&model, &datasets.test, &records, "test", epoch, hp.vis_i, logger, device)
}
