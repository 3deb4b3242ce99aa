// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
// Per batch (training step):
//   y_hat = model(x)                         [batch, steps]
//   loss  = MSE(y_hat[:, w..], y[:, w..])    context steps ignored
//   backward → clip grad norm → Adam step
//
// Per epoch:
//   validation steps on model.valid()  (inner backend, no autodiff)
//   validation_end  → log, assert finite, chart "val/image"
//   plateau scheduler.step(val_loss)
//   checkpoint; stop early after `early_stop_patience` flat epochs
//
// Key Burn insight:
//   - Training uses an AutodiffBackend for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - the validation batcher must also use B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::collections::BTreeMap;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{batcher::SequenceBatcher, dataset::SequenceDataset};
use crate::domain::{hparams::HParams, traits::ExperimentLogger};
use crate::infra::{checkpoint::CheckpointManager, metrics::EpochMetrics};
use crate::ml::evaluator::{eval_steps, validation_end};
use crate::ml::model::{ForecasterConfig, LstmForecaster};
use crate::ml::scheduler::PlateauScheduler;

pub type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type MyInnerBackend = burn::backend::Wgpu;

// ─── Loss ─────────────────────────────────────────────────────────────────────
/// Mean squared error over the forecast steps only.
///
/// The first `window_length` steps of every sequence are context whose
/// labels the model could see, so they are dropped from both tensors.
///
/// # Panics
/// If `window_length` leaves no steps to score.
pub fn masked_mse<B: Backend>(
    y_hat:         Tensor<B, 2>,
    y:             Tensor<B, 2>,
    window_length: usize,
) -> Tensor<B, 1> {
    let [batch_size, steps] = y_hat.dims();
    assert!(
        window_length < steps,
        "window_length {window_length} leaves nothing to score in a {steps}-step output"
    );
    let y_hat = y_hat.slice([0..batch_size, window_length..steps]);
    let y     = y.slice([0..batch_size, window_length..steps]);
    MseLoss::new().forward(y_hat, y, Reduction::Mean)
}

// ─── Options / Summary ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    pub hparams:             HParams,
    /// Stop after this many epochs without a new best val_loss
    pub early_stop_patience: usize,
    /// Shuffle seed for the training loader
    pub seed:                u64,
    /// Log the training-step record every N optimiser steps
    pub log_every:           usize,
}

impl TrainOptions {
    pub fn new(hparams: HParams) -> Self {
        Self { hparams, early_stop_patience: 3, seed: 42, log_every: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSummary {
    pub best_val_loss: f64,
    pub best_epoch:    usize,
    pub epochs_run:    usize,
    pub global_step:   usize,
    pub final_lr:      f64,
    pub early_stopped: bool,
    pub history:       Vec<EpochMetrics>,
}

// ─── Entry point (WGPU) ───────────────────────────────────────────────────────
pub fn run_training(
    opts:          &TrainOptions,
    train_dataset: SequenceDataset,
    val_dataset:   SequenceDataset,
    ckpt_manager:  &CheckpointManager,
    logger:        &mut dyn ExperimentLogger,
) -> Result<TrainSummary> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(opts, train_dataset, val_dataset, ckpt_manager, logger, device)
}

pub fn train_loop<B: AutodiffBackend>(
    opts:          &TrainOptions,
    train_dataset: SequenceDataset,
    val_dataset:   SequenceDataset,
    ckpt_manager:  &CheckpointManager,
    logger:        &mut dyn ExperimentLogger,
    device:        B::Device,
) -> Result<TrainSummary> {
    let hp = &opts.hparams;
    let window_length = hp.window_length;

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = ForecasterConfig::from_hparams(hp);
    let mut model: LstmForecaster<B> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: {} layers, hidden_size={}, bidirectional={}",
        hp.lstm_layers, hp.hidden_size, hp.bidirectional
    );

    // ── Adam optimiser with gradient-norm clipping ────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim_cfg = AdamConfig::new()
        .with_grad_clipping(Some(GradientClippingConfig::Norm(hp.grad_clip as f32)));
    let mut optim = optim_cfg.init();
    let mut scheduler = PlateauScheduler::new(hp.learning_rate, hp.patience);

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = SequenceBatcher::<B>::new(device.clone());
    let mut builder = DataLoaderBuilder::new(train_batcher)
        .batch_size(hp.batch_size)
        .shuffle(opts.seed);
    if hp.num_workers > 0 {
        builder = builder.num_workers(hp.num_workers);
    }
    let train_loader = builder.build(train_dataset);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut global_step   = 0usize;
    let mut best_val_loss = f64::INFINITY;
    let mut best_epoch    = 0usize;
    let mut flat_epochs   = 0usize;
    let mut early_stopped = false;
    let mut history       = Vec::new();

    for epoch in 1..=hp.max_nb_epochs {
        let lr = scheduler.lr();

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let y_hat = model.forward(batch.inputs);
            let loss  = masked_mse(y_hat, batch.targets, window_length);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
            global_step += 1;

            if opts.log_every > 0 && global_step % opts.log_every == 0 {
                let record = BTreeMap::from([("train_loss".to_string(), loss_val)]);
                logger.log_metrics(global_step, &record)?;
            }
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → LstmForecaster<B::InnerBackend>, dropout off
        let model_valid = model.valid();
        let records = eval_steps(&model_valid, val_dataset.clone(), hp.batch_size, "val", &device);
        let report  = validation_end(
            &model_valid, &val_dataset, &records, "val",
            global_step, hp.vis_i, logger, &device,
        )?;
        let avg_val_loss = report.avg_loss;

        logger.log_metrics(global_step, &BTreeMap::from([("lr".to_string(), lr)]))?;
        scheduler.step(avg_val_loss);

        println!(
            "Epoch {:>3}/{} | train_loss={:.5} | val_loss={:.5} | lr={:.1e}",
            epoch, hp.max_nb_epochs, avg_train_loss, avg_val_loss, lr,
        );

        // ── Checkpoint + early stopping ───────────────────────────────────────
        let metrics = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, lr);
        ckpt_manager.save_model(&model, epoch)?;
        if metrics.is_improvement(best_val_loss) {
            best_val_loss = avg_val_loss;
            best_epoch    = epoch;
            flat_epochs   = 0;
            ckpt_manager.mark_best(epoch)?;
            tracing::info!("New best val_loss {:.5} at epoch {}", avg_val_loss, epoch);
            history.push(metrics);
        } else {
            flat_epochs += 1;
            history.push(metrics);
            if flat_epochs >= opts.early_stop_patience {
                tracing::info!(
                    "Early stopping: no improvement for {} epochs (best epoch {})",
                    flat_epochs, best_epoch
                );
                early_stopped = true;
                break;
            }
        }
    }

    tracing::info!("Training complete!");
    Ok(TrainSummary {
        best_val_loss,
        best_epoch,
        epochs_run: history.len(),
        global_step,
        final_lr: scheduler.lr(),
        early_stopped,
        history,
    })
}
