// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training curves to a CSV file after each epoch.
// This is the data behind the loss-curve plot; plotting
// itself is left to whatever reads the CSV.
//
// Output file: {target_dir}/metrics.csv
//
// Example CSV output:
//   fold,epoch,train_loss,train_acc,valid_loss,valid_acc,valid_f1,learning_rate
//   0,1,0.612300,0.671000,0.580100,0.702000,0.655000,0.00040000
//   0,2,0.541200,0.735000,0.566300,0.718000,0.681000,0.00040000
//
// Rows are appended, so a resumed run continues the same file.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "fold,epoch,train_loss,train_acc,valid_loss,valid_acc,valid_f1,learning_rate";

/// One row of metrics data for a single fold epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub fold:          usize,
    /// Starts at 1
    pub epoch:         usize,
    pub train_loss:    f64,
    pub train_acc:     f64,
    pub valid_loss:    f64,
    pub valid_acc:     f64,
    pub valid_f1:      f64,
    /// Learning rate used during this epoch's training pass
    pub learning_rate: f64,
}

impl EpochMetrics {
    /// Returns true if this epoch matches or beats the best F1 so far
    pub fn is_improvement(&self, best_f1: f64) -> bool {
        self.valid_f1 >= best_f1
    }
}

/// Where per-epoch metrics go. The epoch controller only talks
/// to this trait so tests can run without touching the disk.
pub trait MetricsSink {
    fn log(&mut self, m: &EpochMetrics) -> Result<()>;
}

/// Discards everything
#[cfg(test)]
#[derive(Debug, Default)]
pub struct NullSink;

#[cfg(test)]
impl MetricsSink for NullSink {
    fn log(&mut self, _m: &EpochMetrics) -> Result<()> {
        Ok(())
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl MetricsSink for MetricsLogger {
    fn log(&mut self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.8}",
            m.fold,
            m.epoch,
            m.train_loss,
            m.train_acc,
            m.valid_loss,
            m.valid_acc,
            m.valid_f1,
            m.learning_rate,
        )?;

        tracing::debug!(
            "Logged fold {} epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.fold,
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }
}
