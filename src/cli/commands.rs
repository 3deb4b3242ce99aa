// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `test`, `tune` and `suggest`
// and all their configurable flags.
//
// Hyperparameters resolve in three layers, last one wins:
//   built-in defaults  →  --hparams <file.json>  →  individual flags
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::application::{
    train_use_case::{read_hparams, TrainConfig},
    tune_use_case::TuneConfig,
};
use crate::domain::{hparams::HParams, search_space::ParamValue};

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the LSTM forecaster on a smart-meter CSV
    Train(TrainArgs),

    /// Score a trained run on its held-out test split
    Test(TestArgs),

    /// Random search over the LSTM hyperparameter space
    Tune(TuneArgs),

    /// Print one hyperparameter set as JSON
    Suggest(SuggestArgs),
}

/// Where the data comes from and how a run is laid out
#[derive(Args, Debug)]
pub struct DataArgs {
    /// CSV file with a header row and one timestamp column
    #[arg(long, default_value = "data/smartmeter.csv")]
    pub data: String,

    /// Name of the timestamp column
    #[arg(long, default_value = "tstp")]
    pub time_column: String,

    /// Column to forecast
    #[arg(long = "label", default_value = "energy(kWh/hh)")]
    pub labels: Vec<String>,

    /// Output directory for metrics, images and checkpoints
    #[arg(long, default_value = "runs/lstm")]
    pub run_dir: String,

    /// Share of the newest rows (before the test block) used for validation
    #[arg(long, default_value_t = 0.15)]
    pub val_fraction: f64,

    /// Share of the newest rows held out for `test`
    #[arg(long, default_value_t = 0.15)]
    pub test_fraction: f64,

    /// Training loader shuffle seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Epochs without a new best val_loss before training stops
    #[arg(long, default_value_t = 3)]
    pub early_stop_patience: usize,
}

/// Per-flag overrides on top of the defaults or a --hparams file
#[derive(Args, Debug, Default)]
pub struct HParamArgs {
    /// JSON file with a full hyperparameter set (as printed by `suggest`)
    #[arg(long)]
    pub hparams: Option<PathBuf>,

    /// Context rows the model sees with labels
    #[arg(long)]
    pub window_length: Option<usize>,

    /// Forecast horizon in rows
    #[arg(long)]
    pub target_length: Option<usize>,

    #[arg(long)]
    pub hidden_size: Option<usize>,

    #[arg(long)]
    pub lstm_layers: Option<usize>,

    #[arg(long)]
    pub bidirectional: Option<bool>,

    /// Dropout between stacked LSTM layers
    #[arg(long)]
    pub lstm_dropout: Option<f64>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Background threads for batch loading (0 = load on the training thread)
    #[arg(long)]
    pub num_workers: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Plateau epochs before the learning rate is cut by 10x
    #[arg(long)]
    pub patience: Option<usize>,

    /// Validation sample to chart each epoch (0 disables charts)
    #[arg(long)]
    pub vis_i: Option<usize>,

    /// 1 (time) + number of numeric columns in the CSV
    #[arg(long)]
    pub input_size: Option<usize>,

    #[arg(long)]
    pub max_epochs: Option<usize>,

    /// Gradient-norm clipping threshold
    #[arg(long)]
    pub grad_clip: Option<f64>,
}

impl HParamArgs {
    pub fn resolve(&self) -> Result<HParams> {
        let mut hp = match &self.hparams {
            Some(path) => read_hparams(path)?,
            None       => HParams::default(),
        };

        if let Some(v) = self.window_length { hp.window_length = v; }
        if let Some(v) = self.target_length { hp.target_length = v; }
        if let Some(v) = self.hidden_size   { hp.hidden_size   = v; }
        if let Some(v) = self.lstm_layers   { hp.lstm_layers   = v; }
        if let Some(v) = self.bidirectional { hp.bidirectional = v; }
        if let Some(v) = self.lstm_dropout  { hp.lstm_dropout  = v; }
        if let Some(v) = self.batch_size    { hp.batch_size    = v; }
        if let Some(v) = self.num_workers   { hp.num_workers   = v; }
        if let Some(v) = self.learning_rate { hp.learning_rate = v; }
        if let Some(v) = self.patience      { hp.patience      = v; }
        if let Some(v) = self.vis_i         { hp.vis_i         = v; }
        if let Some(v) = self.input_size    { hp.input_size    = v; }
        if let Some(v) = self.max_epochs    { hp.max_nb_epochs = v; }
        if let Some(v) = self.grad_clip     { hp.grad_clip     = v; }
        Ok(hp)
    }
}

/// All arguments for the `train` command
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub hp: HParamArgs,
}

fn train_config(data: DataArgs, hparams: HParams) -> TrainConfig {
    TrainConfig {
        data_path:           data.data,
        time_column:         data.time_column,
        label_names:         data.labels,
        run_dir:             data.run_dir,
        val_fraction:        data.val_fraction,
        test_fraction:       data.test_fraction,
        seed:                data.seed,
        early_stop_patience: data.early_stop_patience,
        hparams,
    }
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// Fallible because --hparams may name a missing or malformed file.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = anyhow::Error;

    fn try_from(a: TrainArgs) -> Result<Self> {
        let hparams = a.hp.resolve()?;
        Ok(train_config(a.data, hparams))
    }
}

/// All arguments for the `test` command
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Run directory written by `train`
    #[arg(long, default_value = "runs/lstm")]
    pub run_dir: PathBuf,
}

/// All arguments for the `tune` command
#[derive(Args, Debug)]
pub struct TuneArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Base values for everything the search does not sample
    #[command(flatten)]
    pub hp: HParamArgs,

    /// Number of random trials
    #[arg(long, default_value_t = 20)]
    pub trials: usize,

    /// Seed for the search-space sampler
    #[arg(long, default_value_t = 0)]
    pub search_seed: u64,

    /// Cap on epochs inside each trial
    #[arg(long, default_value_t = 10)]
    pub max_epochs_per_trial: usize,
}

impl TryFrom<TuneArgs> for TuneConfig {
    type Error = anyhow::Error;

    fn try_from(a: TuneArgs) -> Result<Self> {
        let hparams = a.hp.resolve()?;
        Ok(TuneConfig {
            base:                 train_config(a.data, hparams),
            n_trials:             a.trials,
            search_seed:          a.search_seed,
            max_epochs_per_trial: a.max_epochs_per_trial,
        })
    }
}

/// All arguments for the `suggest` command
#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Sampler seed; omit for a fresh random draw
    #[arg(long)]
    pub seed: Option<u64>,

    /// JSON object of tuned parameters to replay instead of sampling
    #[arg(long)]
    pub fixed: Option<PathBuf>,

    /// Base values for everything the search does not sample
    #[command(flatten)]
    pub hp: HParamArgs,
}

impl SuggestArgs {
    pub fn fixed_params(&self) -> Result<Option<BTreeMap<String, ParamValue>>> {
        let Some(path) = &self.fixed else {
            return Ok(None);
        };
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read fixed params from '{}'", path.display()))?;
        let params = serde_json::from_str(&json)
            .with_context(|| format!("Malformed fixed params in '{}'", path.display()))?;
        Ok(Some(params))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("meter-forecast").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_train_defaults() {
        let Commands::Train(args) = parse(&["train"]) else { panic!("expected train") };
        let cfg = TrainConfig::try_from(args).unwrap();
        assert_eq!(cfg.time_column, "tstp");
        assert_eq!(cfg.label_names, vec!["energy(kWh/hh)".to_string()]);
        assert_eq!(cfg.hparams, HParams::default());
    }

    #[test]
    fn test_flags_override_hparams_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let base = HParams { hidden_size: 128, lstm_layers: 4, ..HParams::default() };
        serde_json::to_writer(&mut file, &base).unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let Commands::Train(args) = parse(&[
            "train", "--hparams", &path, "--lstm-layers", "1", "--bidirectional", "true",
        ]) else { panic!("expected train") };
        let hp = TrainConfig::try_from(args).unwrap().hparams;

        assert_eq!(hp.hidden_size, 128);
        assert_eq!(hp.lstm_layers, 1);
        assert!(hp.bidirectional);
    }

    #[test]
    fn test_missing_hparams_file_is_an_error() {
        let Commands::Train(args) = parse(&["train", "--hparams", "/no/such/hparams.json"])
        else { panic!("expected train") };
        assert!(TrainConfig::try_from(args).is_err());
    }

    #[test]
    fn test_tune_args() {
        let Commands::Tune(args) = parse(&["tune", "--trials", "5", "--max-epochs-per-trial", "2"])
        else { panic!("expected tune") };
        let cfg = TuneConfig::try_from(args).unwrap();
        assert_eq!(cfg.n_trials, 5);
        assert_eq!(cfg.max_epochs_per_trial, 2);
    }
}
