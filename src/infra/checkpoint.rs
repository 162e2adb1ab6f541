// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores per-fold checkpoints.
//
// File naming convention (one set per fold f):
//   {dir}/
//     best_{f}.json             WeightsOnly metadata
//     best_{f}.mpk              model weights (CompactRecorder, half precision)
//     latest_{f}.json           Resumable metadata
//     latest_{f}.mpk            model weights (full precision)
//     latest_{f}_optim.mpk      optimizer state (full precision)
//     model_config.json         model hyperparameters
//
// Folds never share a filename, so fold runs cannot clobber
// each other's checkpoints.
//
// Best checkpoints hold weights only (half precision) and are
// what the ensemble loads. Latest checkpoints hold full
// precision weights plus the optimizer's moment estimates.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::domain::{checkpoint::Checkpoint, error::PipelineError};
use crate::infra::artifact_store::load_json;
use crate::ml::model::{EsimConfig, EsimModel};

const MODEL_CONFIG: &str = "model_config.json";

type FullRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Manages saving and loading of fold checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn best_stem(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("best_{fold}"))
    }

    fn latest_stem(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("latest_{fold}"))
    }

    fn optim_stem(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("latest_{fold}_optim"))
    }

    pub fn best_meta_path(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("best_{fold}.json"))
    }

    pub fn latest_meta_path(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("latest_{fold}.json"))
    }

    pub fn has_latest(&self, fold: usize) -> bool {
        self.latest_meta_path(fold).exists()
    }

    // ── Best (WeightsOnly) ───────────────────────────────────────────────────

    pub fn save_best<B: Backend>(&self, model: &EsimModel<B>, checkpoint: &Checkpoint) -> Result<()> {
        let fold = checkpoint.state().fold;
        let stem = self.best_stem(fold);

        CompactRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save best model to '{}'", stem.display()))?;
        write_meta(&self.best_meta_path(fold), checkpoint)?;

        tracing::debug!(fold, epoch = checkpoint.state().epoch, "Saved best checkpoint");
        Ok(())
    }

    /// Load the best weights of one fold into a freshly built model.
    pub fn load_best<B: Backend>(
        &self,
        fold:   usize,
        model:  EsimModel<B>,
        device: &B::Device,
    ) -> Result<(EsimModel<B>, Checkpoint)> {
        let meta_path = self.best_meta_path(fold);
        if !meta_path.exists() {
            return Err(PipelineError::MissingCheckpoint {
                path: meta_path.display().to_string(),
            }
            .into());
        }
        let checkpoint: Checkpoint = load_json(&meta_path)?;

        let stem = self.best_stem(fold);
        let record = CompactRecorder::new()
            .load(stem.clone(), device)
            .with_context(|| format!("Cannot load best model '{}'", stem.display()))?;

        tracing::info!(
            fold,
            epoch = checkpoint.state().epoch,
            best_score = checkpoint.state().best_score,
            "Loaded best checkpoint"
        );
        Ok((model.load_record(record), checkpoint))
    }

    // ── Latest (Resumable) ───────────────────────────────────────────────────

    pub fn save_latest<B, O>(&self, model: &EsimModel<B>, optimizer: &O, checkpoint: &Checkpoint) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<EsimModel<B>, B>,
    {
        if !checkpoint.is_resumable() {
            bail!("latest checkpoint must carry optimizer state");
        }
        let fold = checkpoint.state().fold;
        let recorder = FullRecorder::new();

        let stem = self.latest_stem(fold);
        recorder
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save model to '{}'", stem.display()))?;

        let optim = self.optim_stem(fold);
        recorder
            .record(optimizer.to_record(), optim.clone())
            .with_context(|| format!("Failed to save optimizer to '{}'", optim.display()))?;

        write_meta(&self.latest_meta_path(fold), checkpoint)?;

        tracing::debug!(fold, epoch = checkpoint.state().epoch, "Saved latest checkpoint");
        Ok(())
    }

    /// Restore model, optimizer and metadata of one fold, or None if
    /// that fold has never written a latest checkpoint.
    pub fn load_latest<B, O>(
        &self,
        fold:      usize,
        model:     EsimModel<B>,
        optimizer: O,
        device:    &B::Device,
    ) -> Result<Option<(EsimModel<B>, O, Checkpoint)>>
    where
        B: AutodiffBackend,
        O: Optimizer<EsimModel<B>, B>,
        EsimModel<B>: AutodiffModule<B>,
    {
        if !self.has_latest(fold) {
            return Ok(None);
        }
        let checkpoint: Checkpoint = load_json(self.latest_meta_path(fold))?;
        if !checkpoint.is_resumable() {
            bail!(
                "'{}' is not a resumable checkpoint",
                self.latest_meta_path(fold).display()
            );
        }

        let recorder = FullRecorder::new();

        let stem = self.latest_stem(fold);
        let model_record = recorder
            .load(stem.clone(), device)
            .with_context(|| format!("Cannot load model '{}'", stem.display()))?;

        let optim = self.optim_stem(fold);
        let optim_record = recorder
            .load(optim.clone(), device)
            .with_context(|| format!("Cannot load optimizer '{}'", optim.display()))?;

        tracing::info!(fold, epoch = checkpoint.state().epoch, "Restored latest checkpoint");
        Ok(Some((
            model.load_record(model_record),
            optimizer.load_record(optim_record),
            checkpoint,
        )))
    }

    // ── Model config ─────────────────────────────────────────────────────────

    /// Saved before training so inference can rebuild the architecture.
    pub fn save_model_config(&self, config: &EsimConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG);
        config
            .save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_model_config(&self) -> Result<Option<EsimConfig>> {
        let path = self.dir.join(MODEL_CONFIG);
        if !path.exists() {
            return Ok(None);
        }
        let config = EsimConfig::load(&path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        Ok(Some(config))
    }
}

fn write_meta(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let json = serde_json::to_string_pretty(checkpoint)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}
