// ============================================================
// Layer 2 — TuneUseCase (random search)
// ============================================================
// Samples hyperparameter sets from the LSTM search space and
// trains one capped run per set:
//
//   <run_dir>/
//     trial_000/   ← full run layout (metrics.csv, images/, checkpoints/)
//     trial_001/
//     ...
//     tune_results.json   ← every trial, its params and best val_loss
//     best_hparams.json   ← feed back into `train --hparams`
//
// The table is loaded once; every trial re-splits it with the same
// fractions, so all trials see identical train/val rows.
//
// Reference: Bergstra & Bengio (2012) Random Search for
//            Hyper-Parameter Optimization

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::{
    build_datasets, prepare_run_dir, write_hparams, write_summary, SplitDatasets, TrainConfig,
};
use crate::data::loader::CsvTableLoader;
use crate::domain::{
    hparams::HParams,
    search_space::{add_suggest, FixedTrial, OperationalDefaults, ParamValue, RandomTrial, Trial},
    table::SeriesTable,
    traits::TableSource,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::RunLogger};
use crate::ml::trainer::{run_training, TrainSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneConfig {
    /// Data settings and the non-tuned hyperparameters shared by all trials
    pub base:                 TrainConfig,
    pub n_trials:             usize,
    /// Seed for the search-space sampler
    pub search_seed:          u64,
    /// Cap on max_nb_epochs inside each trial
    pub max_epochs_per_trial: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial:         usize,
    pub params:        BTreeMap<String, ParamValue>,
    pub hparams:       HParams,
    pub best_val_loss: f64,
    pub epochs_run:    usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneSummary {
    pub trials: Vec<TrialResult>,
    pub best:   Option<TrialResult>,
}

pub struct TuneUseCase {
    config: TuneConfig,
}

impl TuneUseCase {
    pub fn new(config: TuneConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TuneSummary> {
        let base = &self.config.base;
        tracing::info!("Loading table from '{}'", base.data_path);
        let table = CsvTableLoader::new(&base.data_path, &base.time_column).load()?;

        run_search(&self.config, &table, |cfg, datasets, ckpt, logger| {
            run_training(&cfg.train_options(), datasets.train, datasets.val, ckpt, logger)
        })
    }
}

/// Drive `n_trials` random trials; `train` runs one trial's training.
pub fn run_search<F>(cfg: &TuneConfig, table: &SeriesTable, mut train: F) -> Result<TuneSummary>
where
    F: FnMut(&TrainConfig, SplitDatasets, &CheckpointManager, &mut RunLogger) -> Result<TrainSummary>,
{
    let defaults = OperationalDefaults::from(&cfg.base.hparams);
    let mut rng  = StdRng::seed_from_u64(cfg.search_seed);
    let mut trials = Vec::with_capacity(cfg.n_trials);

    for n in 0..cfg.n_trials {
        let mut trial   = RandomTrial::new(rng);
        let mut hparams = add_suggest(&mut trial, &defaults)?;
        let params      = trial.params().clone();
        rng = trial.into_rng();

        hparams.max_nb_epochs = hparams.max_nb_epochs.min(cfg.max_epochs_per_trial);
        let trial_cfg = TrainConfig {
            run_dir: Path::new(&cfg.base.run_dir)
                .join(format!("trial_{n:03}"))
                .to_string_lossy()
                .into_owned(),
            hparams: hparams.clone(),
            ..cfg.base.clone()
        };
        tracing::info!("Trial {}/{}: {:?}", n + 1, cfg.n_trials, params);

        let datasets = build_datasets(table, &trial_cfg)?;
        let (ckpt, mut logger) = prepare_run_dir(&trial_cfg)?;
        let summary = train(&trial_cfg, datasets, &ckpt, &mut logger)?;
        write_summary(&trial_cfg, &summary)?;

        println!(
            "Trial {:>3} | best_val_loss={:.5} | epochs={} | {:?}",
            n, summary.best_val_loss, summary.epochs_run, params
        );
        trials.push(TrialResult {
            trial: n,
            params,
            hparams,
            best_val_loss: summary.best_val_loss,
            epochs_run: summary.epochs_run,
        });
    }

    let best = trials
        .iter()
        .filter(|t| t.best_val_loss.is_finite())
        .min_by(|a, b| a.best_val_loss.total_cmp(&b.best_val_loss))
        .cloned();
    let summary = TuneSummary { trials, best };

    let out_dir = Path::new(&cfg.base.run_dir);
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Cannot create '{}'", out_dir.display()))?;
    fs::write(out_dir.join("tune_results.json"), serde_json::to_string_pretty(&summary)?)
        .context("Cannot write tune_results.json")?;
    if let Some(best) = &summary.best {
        write_hparams(out_dir.join("best_hparams.json"), &best.hparams)?;
        tracing::info!("Best trial {} with val_loss {:.5}", best.trial, best.best_val_loss);
    }

    Ok(summary)
}

/// One hyperparameter set: replayed from `fixed` when given, else sampled.
pub fn suggest_hparams(
    defaults: &OperationalDefaults,
    seed:     Option<u64>,
    fixed:    Option<BTreeMap<String, ParamValue>>,
) -> Result<HParams> {
    let mut trial: Box<dyn Trial> = match (fixed, seed) {
        (Some(params), _)  => Box::new(FixedTrial::new(params)),
        (None, Some(seed)) => Box::new(RandomTrial::new(StdRng::seed_from_u64(seed))),
        (None, None)       => Box::new(RandomTrial::new(StdRng::from_entropy())),
    };
    add_suggest(trial.as_mut(), defaults)
}
