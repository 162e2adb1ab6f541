// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Labels the test split with the fold ensemble:
//
//   Step 1: Load the encoded test set            (Layer 6 - infra)
//   Step 2: Resolve the model architecture       (Layer 6 - infra)
//   Step 3: Ensemble the K best checkpoints      (Layer 5 - ml)
//   Step 4: Append labels to the raw test CSV    (this file)
//
// The architecture comes from model_config.json written at
// training time. Any dimension set explicitly in the test
// config overrides the saved value.
//
// Reference: Rust Book §9 (Error Handling)

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::domain::corpus::EncodedDataset;
use crate::infra::{artifact_store::load_json, checkpoint::CheckpointManager};
use crate::ml::{
    backend::{cpu_device, gpu_device, CpuBackend, DeviceKind, GpuBackend},
    ensemble::EnsemblePredictor,
    model::EsimConfig,
};

// ─── Test Configuration ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub test_data:      PathBuf,
    pub vocab_size:     Option<usize>,
    pub embedding_dim:  Option<usize>,
    pub hidden_size:    Option<usize>,
    pub num_classes:    Option<usize>,
    pub batch_size:     usize,
    pub kfold:          usize,
    /// Where best_{fold} checkpoints and model_config.json live
    pub checkpoint_dir: PathBuf,
    /// Raw test pairs; labels are appended to its rows
    pub test_csv:       PathBuf,
    pub output_file:    PathBuf,
    pub device:         DeviceKind,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            test_data:      PathBuf::from("data/preprocessed/test_data.json"),
            vocab_size:     None,
            embedding_dim:  None,
            hidden_size:    None,
            num_classes:    None,
            batch_size:     32,
            kfold:          5,
            checkpoint_dir: PathBuf::from("data/checkpoints"),
            test_csv:       PathBuf::from("data/test.csv"),
            output_file:    PathBuf::from("data/test_result.csv"),
            device:         DeviceKind::Cpu,
        }
    }
}

// ─── TestUseCase ─────────────────────────────────────────────────────────────
pub struct TestUseCase {
    config: TestConfig,
}

impl TestUseCase {
    pub fn new(config: TestConfig) -> Self {
        Self { config }
    }

    /// Returns the predicted labels after writing the result file.
    pub fn execute(&self) -> Result<Vec<usize>> {
        let cfg = &self.config;

        // ── Step 1: Test set ──────────────────────────────────────────────────
        let data: EncodedDataset = load_json(&cfg.test_data)?;
        tracing::info!("Loaded {} test pairs", data.len());

        // ── Step 2: Architecture ──────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir)?;
        tracing::info!("Loading {} fold checkpoints from '{}'", cfg.kfold, checkpoints.dir().display());
        let model_config = self.model_config(checkpoints.load_model_config()?)?;

        // ── Step 3: Ensemble ──────────────────────────────────────────────────
        let labels = match cfg.device {
            DeviceKind::Cpu => self.predict::<CpuBackend>(checkpoints, model_config, &data, cpu_device())?,
            DeviceKind::Gpu => self.predict::<GpuBackend>(checkpoints, model_config, &data, gpu_device())?,
        };
        let positives = labels.iter().filter(|&&l| l == 1).count();
        tracing::info!("Predicted {} positive of {} pairs", positives, labels.len());

        // ── Step 4: Result file ───────────────────────────────────────────────
        let source = fs::read_to_string(&cfg.test_csv)
            .with_context(|| format!("Cannot read '{}'", cfg.test_csv.display()))?;
        let result = append_labels(&source, &labels)?;
        fs::write(&cfg.output_file, result)
            .with_context(|| format!("Cannot write '{}'", cfg.output_file.display()))?;
        tracing::info!("Wrote results to '{}'", cfg.output_file.display());

        Ok(labels)
    }

    fn predict<B: Backend>(
        &self,
        checkpoints:  CheckpointManager,
        model_config: EsimConfig,
        data:         &EncodedDataset,
        device:       B::Device,
    ) -> Result<Vec<usize>> {
        tracing::info!("Testing ESIM on device: {:?}", device);
        EnsemblePredictor::<B>::new(checkpoints, model_config, self.config.batch_size, device)
            .predict(data, self.config.kfold)
    }

    fn model_config(&self, saved: Option<EsimConfig>) -> Result<EsimConfig> {
        let cfg = &self.config;
        let pick = |explicit: Option<usize>, saved: Option<usize>, name: &str| {
            explicit
                .or(saved)
                .with_context(|| format!("{name} is not set and no model_config.json was found"))
        };

        let config = EsimConfig::new(
            pick(cfg.vocab_size, saved.as_ref().map(|c| c.vocab_size), "vocab_size")?,
            pick(cfg.embedding_dim, saved.as_ref().map(|c| c.embedding_dim), "embedding_dim")?,
            pick(cfg.hidden_size, saved.as_ref().map(|c| c.hidden_size), "hidden_size")?,
        )
        .with_num_classes(
            cfg.num_classes
                .or(saved.as_ref().map(|c| c.num_classes))
                .unwrap_or(2),
        );
        Ok(config)
    }
}

/// Append one label per data row as the last column. The header
/// is kept unchanged and blank lines are dropped.
pub fn append_labels(source: &str, labels: &[usize]) -> Result<String> {
    let mut lines = source.lines();
    let mut out: Vec<String> = lines.next().map(str::to_string).into_iter().collect();

    let rows: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
    if rows.len() != labels.len() {
        bail!("test CSV has {} rows but {} labels were predicted", rows.len(), labels.len());
    }

    for (row, label) in rows.iter().zip(labels) {
        let row = row.trim_end();
        if row.ends_with(',') {
            out.push(format!("{row}{label}"));
        } else {
            out.push(format!("{row},{label}"));
        }
    }
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_labels() {
        let source = "qid1,qid2,label\nq1,q2,\nq3,q4\n\n";
        let out = append_labels(source, &[1, 0]).unwrap();
        assert_eq!(out, "qid1,qid2,label\nq1,q2,1\nq3,q4,0");
    }

    #[test]
    fn test_append_labels_row_count_must_match() {
        assert!(append_labels("h\na,b,\n", &[1, 0]).is_err());
    }

    #[test]
    fn test_explicit_dimensions_override_saved_config() {
        let use_case = TestUseCase::new(TestConfig { hidden_size: Some(8), ..TestConfig::default() });
        let saved = EsimConfig::new(100, 16, 4).with_num_classes(2);
        let config = use_case.model_config(Some(saved)).unwrap();
        assert_eq!((config.vocab_size, config.embedding_dim, config.hidden_size), (100, 16, 8));

        assert!(TestUseCase::new(TestConfig::default()).model_config(None).is_err());
    }

    #[test]
    fn test_end_to_end_with_trained_folds() {
        use crate::application::train_use_case::{TrainConfig, TrainUseCase};
        use crate::data::embeddings::EmbeddingMatrix;
        use crate::domain::corpus::EncodedExample;
        use crate::infra::artifact_store::{ArtifactStore, EMBEDDINGS, TEST_DATA, TRAIN_DATA};

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("pre")).unwrap();

        let mut train = EncodedDataset::default();
        for i in 0..6 {
            train.push(EncodedExample { premise: vec![2, 4 + i % 3, 3], hypothesis: vec![2, 5, 3], label: i % 2 });
        }
        let mut test = EncodedDataset::default();
        test.push(EncodedExample { premise: vec![2, 4, 3], hypothesis: vec![2, 6, 3], label: 1 });
        test.push(EncodedExample { premise: vec![2, 6, 5, 3], hypothesis: vec![2, 3], label: 1 });
        store.save(TRAIN_DATA, &train).unwrap();
        store.save(TEST_DATA, &test).unwrap();
        store.save(EMBEDDINGS, &EmbeddingMatrix::zeros(7, 4)).unwrap();

        let ckpt = dir.path().join("ckpt");
        TrainUseCase::new(TrainConfig {
            train_data: store.path(TRAIN_DATA),
            embeddings: store.path(EMBEDDINGS),
            target_dir: ckpt.clone(),
            hidden_size: 3,
            epochs: 1,
            batch_size: 2,
            kfold: 3,
            show_progress: false,
            ..TrainConfig::default()
        })
        .execute()
        .unwrap();

        let csv = dir.path().join("test.csv");
        fs::write(&csv, "q1,q2,label\na,b,\nc,d,\n").unwrap();
        let output = dir.path().join("result.csv");
        let labels = TestUseCase::new(TestConfig {
            test_data: store.path(TEST_DATA),
            batch_size: 2,
            kfold: 3,
            checkpoint_dir: ckpt,
            test_csv: csv,
            output_file: output.clone(),
            ..TestConfig::default()
        })
        .execute()
        .unwrap();

        assert_eq!(labels.len(), 2);
        let written = fs::read_to_string(output).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert!(written.lines().nth(1).unwrap().starts_with("a,b,"));
    }
}
