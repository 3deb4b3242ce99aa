// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `train`   — trains the forecaster on a CSV table
//   2. `test`    — scores a trained run on its test split
//   3. `tune`    — random hyperparameter search
//   4. `suggest` — prints one hyperparameter set as JSON
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, SuggestArgs, TestArgs, TrainArgs, TuneArgs};

use crate::domain::search_space::OperationalDefaults;

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "meter-forecast",
    version,
    about = "Train an LSTM to forecast smart-meter energy use from a sliding window of readings."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => Self::run_train(args),
            Commands::Test(args)    => Self::run_test(args),
            Commands::Tune(args)    => Self::run_tune(args),
            Commands::Suggest(args) => Self::run_suggest(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on: {}", args.data.data);

        // Convert CLI args → application config
        let use_case = TrainUseCase::new(args.try_into()?);
        let summary  = use_case.execute()?;

        println!(
            "\nTraining complete: best val_loss={:.5} at epoch {} ({} epochs, final lr={:.1e})",
            summary.best_val_loss, summary.best_epoch, summary.epochs_run, summary.final_lr,
        );
        println!("Run saved to '{}'", use_case.config().run_dir);
        Ok(())
    }

    fn run_test(args: TestArgs) -> Result<()> {
        use crate::application::test_use_case::TestUseCase;

        let report = TestUseCase::new(args.run_dir).execute()?;
        println!("\nTest: test_loss={:.5} over {} batches", report.avg_loss, report.batches);
        Ok(())
    }

    fn run_tune(args: TuneArgs) -> Result<()> {
        use crate::application::tune_use_case::TuneUseCase;

        let summary = TuneUseCase::new(args.try_into()?).execute()?;
        match summary.best {
            Some(best) => {
                println!(
                    "\nBest trial {}: val_loss={:.5}",
                    best.trial, best.best_val_loss
                );
                println!("{}", serde_json::to_string_pretty(&best.hparams)?);
            }
            None => println!("\nNo trial finished with a finite val_loss."),
        }
        Ok(())
    }

    fn run_suggest(args: SuggestArgs) -> Result<()> {
        use crate::application::tune_use_case::suggest_hparams;

        let base     = args.hp.resolve()?;
        let defaults = OperationalDefaults::from(&base);
        let hparams  = suggest_hparams(&defaults, args.seed, args.fixed_params()?)?;
        println!("{}", serde_json::to_string_pretty(&hparams)?);
        Ok(())
    }
}
