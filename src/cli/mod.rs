// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
//   1. `preprocess` — CSV corpus → JSON artifacts
//   2. `train`      — k-fold ESIM training with checkpoints
//   3. `test`       — ensemble prediction over the test set
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs, TrainArgs};

use crate::application::{
    preprocess_use_case::{PreprocessConfig, PreprocessUseCase},
    test_use_case::{TestConfig, TestUseCase},
    train_use_case::{TrainConfig, TrainUseCase},
};

#[derive(Parser, Debug)]
#[command(
    name = "esim-kfold",
    version = "0.1.0",
    about = "Preprocess a sentence-pair corpus, train ESIM with k-fold cross-validation, and label the test set."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess(args) => run_preprocess(args),
            Commands::Train(args)      => run_train(args),
            Commands::Test(args)       => run_test(args),
        }
    }
}

fn run_preprocess(args: ConfigArgs) -> Result<()> {
    let config: PreprocessConfig = args.load()?;
    tracing::info!("Preprocessing corpus in: {}", config.data_dir.display());

    PreprocessUseCase::new(config.clone()).execute()?;
    println!("Preprocessing complete. Artifacts in {}", config.target_dir.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut config: TrainConfig = args.config.load()?;
    config.resume |= args.resume;
    tracing::info!("Starting {}-fold training, checkpoints in: {}", config.kfold, config.target_dir.display());

    let report = TrainUseCase::new(config).execute()?;
    for fold in &report.folds {
        println!(
            "Fold {}: best F1 {:.4} after {} epochs{}",
            fold.fold,
            fold.best_score,
            fold.epochs_run,
            if fold.stopped_early { " (early stop)" } else { "" },
        );
    }
    println!("Mean best F1: {:.4}", report.mean_score()?);
    Ok(())
}

fn run_test(args: ConfigArgs) -> Result<()> {
    let config: TestConfig = args.load()?;
    let output = config.output_file.clone();

    let labels = TestUseCase::new(config).execute()?;
    println!("Labelled {} pairs. Results written to {}", labels.len(), output.display());
    Ok(())
}
