// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates k-fold training in order:
//
//   Step 1: Load encoded train data + embeddings  (Layer 6 - infra)
//   Step 2: Pick the backend for the device       (Layer 5 - ml)
//   Step 3: Save the model config                 (Layer 6 - infra)
//   Step 4: Split into K folds                    (Layer 4 - data)
//   Step 5: Per fold: fresh model from the pretrained
//           embeddings (or the fold's latest checkpoint when
//           resuming), FoldTrainer + EpochController      (Layer 5 - ml)
//   Step 6: Report per-fold and mean best F1
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{ensure, Result};
use burn::tensor::backend::{AutodiffBackend, Backend};
use serde::{Deserialize, Serialize};

use crate::data::{dataset::NliDataset, embeddings::EmbeddingMatrix, splitter::{FoldSplit, KFold}};
use crate::domain::corpus::EncodedDataset;
use crate::infra::{
    artifact_store::load_json,
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
};
use crate::ml::{
    backend::{cpu_device, gpu_device, CpuAutodiff, DeviceKind, GpuAutodiff},
    controller::{EpochController, FoldOutcome},
    cross_validation::{CrossValidationReport, CrossValidator},
    model::EsimConfig,
    trainer::{adam, FoldTrainer, LoaderOptions},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Read from the JSON file passed with --config. Missing keys
// fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub train_data:        PathBuf,
    /// Accepted for compatibility; k-fold validates on held-out folds
    pub valid_data:        Option<PathBuf>,
    pub embeddings:        PathBuf,
    /// Checkpoints, model config and metrics.csv
    pub target_dir:        PathBuf,
    pub hidden_size:       usize,
    pub dropout:           f64,
    pub num_classes:       usize,
    pub epochs:            usize,
    pub batch_size:        usize,
    pub patience:          usize,
    pub max_gradient_norm: f64,
    pub kfold:             usize,
    pub learning_rate:     f64,
    pub seed:              u64,
    pub shuffle_folds:     bool,
    pub num_workers:       usize,
    pub device:            DeviceKind,
    /// Continue each fold from its latest checkpoint if present
    pub resume:            bool,
    pub show_progress:     bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_data:        PathBuf::from("data/preprocessed/train_data.json"),
            valid_data:        None,
            embeddings:        PathBuf::from("data/preprocessed/embeddings.json"),
            target_dir:        PathBuf::from("data/checkpoints"),
            hidden_size:       300,
            dropout:           0.5,
            num_classes:       2,
            epochs:            64,
            batch_size:        32,
            patience:          5,
            max_gradient_norm: 10.0,
            kfold:             5,
            learning_rate:     4e-4,
            seed:              42,
            shuffle_folds:     false,
            num_workers:       1,
            device:            DeviceKind::Cpu,
            resume:            false,
            show_progress:     true,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CrossValidationReport> {
        let cfg = &self.config;

        // ── Step 1: Preprocessed artifacts ────────────────────────────────────
        let data: EncodedDataset = load_json(&cfg.train_data)?;
        ensure!(!data.is_empty(), "'{}' contains no labelled pairs", cfg.train_data.display());
        let embeddings: EmbeddingMatrix = load_json(&cfg.embeddings)?;
        tracing::info!(
            "Loaded {} training pairs, embeddings {}x{}",
            data.len(), embeddings.rows(), embeddings.dim(),
        );
        if let Some(valid) = &cfg.valid_data {
            tracing::debug!("Ignoring valid_data '{}': folds provide validation", valid.display());
        }

        // ── Step 2: Backend ───────────────────────────────────────────────────
        match cfg.device {
            DeviceKind::Cpu => self.run::<CpuAutodiff>(&data, &embeddings, cpu_device()),
            DeviceKind::Gpu => self.run::<GpuAutodiff>(&data, &embeddings, gpu_device()),
        }
    }

    fn run<B: AutodiffBackend>(
        &self,
        data:       &EncodedDataset,
        embeddings: &EmbeddingMatrix,
        device:     B::Device,
    ) -> Result<CrossValidationReport> {
        let cfg = &self.config;
        tracing::info!("Training ESIM on device: {:?}", device);
        B::seed(cfg.seed);

        // ── Step 3: Model config for the test stage ───────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.target_dir)?;
        let model_config = EsimConfig::new(embeddings.rows(), embeddings.dim(), cfg.hidden_size)
            .with_num_classes(cfg.num_classes)
            .with_dropout(cfg.dropout);
        checkpoints.save_model_config(&model_config)?;

        let mut metrics = MetricsLogger::new(&cfg.target_dir)?;
        tracing::info!("Epoch metrics: '{}'", metrics.csv_path().display());

        // ── Step 4: Folds ─────────────────────────────────────────────────────
        let mut kfold = KFold::new(cfg.kfold);
        if cfg.shuffle_folds {
            kfold = kfold.with_shuffle(cfg.seed);
        }

        // ── Steps 5–6: Train every fold ───────────────────────────────────────
        CrossValidator::new(kfold).run(data.len(), |split| {
            self.run_fold::<B>(split, data, embeddings, &model_config, &checkpoints, &mut metrics, &device)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_fold<B: AutodiffBackend>(
        &self,
        split:        &FoldSplit,
        data:         &EncodedDataset,
        embeddings:   &EmbeddingMatrix,
        model_config: &EsimConfig,
        checkpoints:  &CheckpointManager,
        metrics:      &mut MetricsLogger,
        device:       &<B as Backend>::Device,
    ) -> Result<FoldOutcome> {
        let cfg = &self.config;
        let fold = split.fold;

        let model = model_config.init_with_embeddings::<B>(embeddings, device)?;
        let optimizer = adam::<B>(cfg.max_gradient_norm as f32);

        let restored = if cfg.resume {
            checkpoints.load_latest(fold, model.clone(), adam::<B>(cfg.max_gradient_norm as f32), device)?
        } else {
            None
        };
        let (model, optimizer, controller, start_epoch) = match restored {
            Some((model, optimizer, checkpoint)) => {
                let controller = EpochController::resume(&checkpoint, cfg.epochs, cfg.patience)?;
                (model, optimizer, controller, checkpoint.state().epoch)
            }
            None => {
                let controller = EpochController::new(fold, cfg.epochs, cfg.patience, cfg.learning_rate);
                (model, optimizer, controller, 0)
            }
        };

        let options = LoaderOptions {
            batch_size:    cfg.batch_size,
            num_workers:   cfg.num_workers,
            seed:          loader_seed(cfg.seed, fold, start_epoch),
            show_progress: cfg.show_progress,
        };
        let mut trainer = FoldTrainer::new(
            fold,
            model,
            optimizer,
            NliDataset::from(&data.select(&split.train)),
            NliDataset::from(&data.select(&split.valid)),
            &options,
            device,
            checkpoints.clone(),
        );

        controller.run(&mut trainer, metrics)
    }
}

/// Shuffle seed of a fold's training loader. The start epoch is
/// mixed in so a resumed fold does not replay its first epochs' order.
fn loader_seed(seed: u64, fold: usize, start_epoch: usize) -> u64 {
    seed.wrapping_add(fold as u64)
        .wrapping_add((start_epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::corpus::EncodedExample;
    use crate::infra::artifact_store::{ArtifactStore, EMBEDDINGS, TRAIN_DATA};
    use std::fs;

    fn setup(dir: &std::path::Path) -> TrainConfig {
        let store = ArtifactStore::new(dir.join("pre")).unwrap();

        let mut data = EncodedDataset::default();
        for i in 0..8 {
            data.push(EncodedExample {
                premise:    vec![2, 4 + i % 4, 5, 3],
                hypothesis: vec![2, 4 + (i + 2) % 4, 3],
                label:      i % 2,
            });
        }
        store.save(TRAIN_DATA, &data).unwrap();
        store.save(EMBEDDINGS, &EmbeddingMatrix::zeros(8, 4)).unwrap();

        TrainConfig {
            train_data: store.path(TRAIN_DATA),
            embeddings: store.path(EMBEDDINGS),
            target_dir: dir.join("ckpt"),
            hidden_size: 3,
            epochs: 2,
            batch_size: 2,
            kfold: 2,
            show_progress: false,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_trains_every_fold_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        let ckpt = config.target_dir.clone();

        let report = TrainUseCase::new(config.clone()).execute().unwrap();
        assert_eq!(report.folds.len(), 2);
        assert!(report.folds.iter().all(|f| f.epochs_run == 2));
        for file in ["best_0.json", "best_1.json", "latest_1_optim.mpk", "model_config.json"] {
            assert!(ckpt.join(file).exists(), "{file} missing");
        }

        // one more epoch per fold, continuing the history
        let resumed = TrainConfig { epochs: 3, resume: true, ..config };
        let report = TrainUseCase::new(resumed).execute().unwrap();
        assert!(report.folds.iter().all(|f| f.epochs_run == 3 && f.history.len() == 3));

        let csv = fs::read_to_string(ckpt.join("metrics.csv")).unwrap();
        // header + 2 folds × (2 + 1) epochs
        assert_eq!(csv.lines().count(), 7);
    }

    #[test]
    fn test_loader_seed_differs_per_fold_and_resume_point() {
        assert_eq!(loader_seed(42, 1, 0), 43);
        assert_ne!(loader_seed(42, 1, 3), loader_seed(42, 1, 0));
        assert_ne!(loader_seed(42, 0, 3), loader_seed(42, 1, 3));
    }

    #[test]
    fn test_empty_training_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path());
        fs::write(&config.train_data, serde_json::to_string(&EncodedDataset::default()).unwrap()).unwrap();

        let err = TrainUseCase::new(config).execute().unwrap_err();
        assert!(format!("{err:#}").contains("no labelled pairs"));
    }

    #[test]
    fn test_config_defaults_fill_missing_keys() {
        let cfg: TrainConfig = serde_json::from_str(r#"{"kfold": 10, "device": "gpu"}"#).unwrap();
        assert_eq!(cfg.kfold, 10);
        assert_eq!(cfg.device, DeviceKind::Gpu);
        assert_eq!(cfg.patience, 5);
        assert_eq!(cfg.learning_rate, 4e-4);
    }
}
