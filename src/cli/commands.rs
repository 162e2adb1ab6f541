// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `preprocess`, `train` and
// `test`. Each one reads its settings from a JSON file given
// with --config; keys missing from the file (or the whole file
// when --config is omitted) take the defaults of the matching
// application config.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;

/// The three pipeline stages, run in this order
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vocabulary, encoded datasets and embedding matrix
    Preprocess(ConfigArgs),

    /// Train one ESIM model per fold with early stopping
    Train(TrainArgs),

    /// Label the test set with the ensemble of fold checkpoints
    Test(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Deserialise the config file, or fall back to defaults
    pub fn load<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match &self.config {
            Some(path) => load_config(path),
            None => {
                tracing::info!("No --config given, using defaults");
                Ok(T::default())
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Continue every fold from its latest checkpoint
    #[arg(long)]
    pub resume: bool,
}

fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid config '{}'", path.display()))
}
