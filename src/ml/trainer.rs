// ============================================================
// Layer 5 — Fold Trainer
// ============================================================
// Owns the model, optimizer and data loaders of one fold and
// implements EpochRunner for the epoch controller.
//
//   train_epoch → shuffled batches, forward, cross-entropy,
//                 backward, Adam step (gradient norm clipped
//                 inside the optimizer)
//   validate    → model.valid() on the inner backend, fixed
//                 batch order, no gradients
//   persist     → best / latest checkpoint via CheckpointManager
//
// Key Burn insight:
//   - Training runs on B (Autodiff<...>) for gradients
//   - model.valid() returns the model on B::InnerBackend,
//     which also disables dropout
//   - The validation batcher must therefore use B::InnerBackend
//   - argmax(1) returns [batch, 1], flatten before comparing
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::{sync::Arc, time::Instant};

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::{
    batcher::{NliBatch, NliBatcher},
    dataset::NliDataset,
};
use crate::domain::{
    checkpoint::Checkpoint,
    traits::{EpochRunner, EpochSummary, ValidationSummary},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{metrics::BinaryCounts, model::EsimModel};

/// Adam with gradient-norm clipping, as used for every fold.
pub fn adam<B: AutodiffBackend>(max_gradient_norm: f32) -> impl Optimizer<EsimModel<B>, B> {
    AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(max_gradient_norm)))
        .init()
}

/// Data loading knobs shared by training and validation.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub batch_size:    usize,
    pub num_workers:   usize,
    /// Seeds the per-epoch shuffle of the training stream
    pub seed:          u64,
    pub show_progress: bool,
}

pub struct FoldTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<EsimModel<B>, B>,
{
    fold:          usize,
    model:         EsimModel<B>,
    optimizer:     O,
    train_loader:  Arc<dyn DataLoader<NliBatch<B>>>,
    valid_loader:  Arc<dyn DataLoader<NliBatch<B::InnerBackend>>>,
    train_batches: usize,
    checkpoints:   CheckpointManager,
    show_progress: bool,
}

impl<B, O> FoldTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<EsimModel<B>, B>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fold:        usize,
        model:       EsimModel<B>,
        optimizer:   O,
        train:       NliDataset,
        valid:       NliDataset,
        options:     &LoaderOptions,
        device:      &B::Device,
        checkpoints: CheckpointManager,
    ) -> Self {
        let train_batches = train.item_count().div_ceil(options.batch_size.max(1));
        tracing::info!(
            "Fold {}: {} training / {} validation examples",
            fold, train.item_count(), valid.item_count(),
        );

        // ── Training data loader (AutodiffBackend) ────────────────────────────
        let train_loader = DataLoaderBuilder::new(NliBatcher::<B>::new(device.clone()))
            .batch_size(options.batch_size)
            .shuffle(options.seed)
            .num_workers(options.num_workers)
            .build(train);

        // ── Validation data loader (InnerBackend, fixed order) ────────────────
        let valid_loader = DataLoaderBuilder::new(NliBatcher::<B::InnerBackend>::new(device.clone()))
            .batch_size(options.batch_size)
            .num_workers(options.num_workers)
            .build(valid);

        Self {
            fold,
            model,
            optimizer,
            train_loader,
            valid_loader,
            train_batches,
            checkpoints,
            show_progress: options.show_progress,
        }
    }

    #[cfg(test)]
    pub fn model(&self) -> &EsimModel<B> {
        &self.model
    }

    fn progress_bar(&self, epoch: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.train_batches as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_prefix(format!("fold {} epoch {}", self.fold, epoch));
        pb
    }
}

impl<B, O> EpochRunner for FoldTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<EsimModel<B>, B>,
{
    fn train_epoch(&mut self, epoch: usize, learning_rate: f64) -> Result<EpochSummary> {
        let start = Instant::now();
        let pb = self.progress_bar(epoch);

        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        let mut correct  = 0usize;
        let mut total    = 0usize;
        let mut batch_time = 0.0f64;

        for batch in self.train_loader.iter() {
            let batch_start = Instant::now();

            let (loss, output) = self.model.forward_loss(
                batch.premises,
                batch.premise_mask,
                batch.hypotheses,
                batch.hypothesis_mask,
                batch.labels.clone(),
            );

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            total += batch.labels.dims()[0];
            let batch_correct: i64 = output.logits
                .argmax(1)
                .flatten::<1>(0, 1)
                .equal(batch.labels)
                .int().sum().into_scalar().elem::<i64>();
            correct += batch_correct as usize;

            // Backward pass + Adam update
            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self.optimizer.step(learning_rate, self.model.clone(), grads);

            batch_time += batch_start.elapsed().as_secs_f64();
            pb.set_message(format!(
                "avg batch {:.4}s, loss {:.4}",
                batch_time / batches as f64,
                loss_sum / batches as f64,
            ));
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(EpochSummary {
            elapsed:  start.elapsed(),
            loss:     if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
            accuracy: if total > 0 { correct as f64 / total as f64 } else { 0.0 },
        })
    }

    fn validate(&mut self) -> Result<ValidationSummary> {
        let start = Instant::now();
        // model.valid() → EsimModel<B::InnerBackend>, dropout disabled
        let model = self.model.valid();

        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        let mut counts   = BinaryCounts::default();

        for batch in self.valid_loader.iter() {
            let (loss, output) = model.forward_loss(
                batch.premises,
                batch.premise_mask,
                batch.hypotheses,
                batch.hypothesis_mask,
                batch.labels.clone(),
            );
            loss_sum += loss.into_scalar().elem::<f64>();
            batches  += 1;

            let predictions = class_ids(output.logits.argmax(1).flatten::<1>(0, 1));
            let labels = class_ids(batch.labels);
            counts.update(&predictions, &labels);
        }

        Ok(ValidationSummary {
            elapsed:  start.elapsed(),
            loss:     if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
            accuracy: counts.accuracy(),
            f1:       counts.f1(),
        })
    }

    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        match checkpoint {
            Checkpoint::WeightsOnly { .. } => self.checkpoints.save_best(&self.model, checkpoint),
            Checkpoint::Resumable { .. } => {
                self.checkpoints.save_latest(&self.model, &self.optimizer, checkpoint)
            }
        }
    }
}

/// Int tensor of class ids → host vector
pub fn class_ids<B: Backend>(ids: Tensor<B, 1, Int>) -> Vec<usize> {
    ids.into_data().iter::<i64>().map(|id| id as usize).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::NliItem;
    use crate::ml::model::EsimConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn items(n: usize) -> Vec<NliItem> {
        (0..n)
            .map(|i| NliItem {
                premise:    vec![2, 4 + i % 5, 5, 3],
                hypothesis: vec![2, 4 + (i + 1) % 5, 3],
                label:      i % 2,
            })
            .collect()
    }

    fn trainer(
        dir: &std::path::Path,
    ) -> FoldTrainer<TestBackend, impl Optimizer<EsimModel<TestBackend>, TestBackend>> {
        let device = Default::default();
        let model = EsimConfig::new(10, 4, 3).init::<TestBackend>(&device);
        let options = LoaderOptions { batch_size: 4, num_workers: 1, seed: 7, show_progress: false };
        FoldTrainer::new(
            0,
            model,
            adam(10.0),
            NliDataset::new(items(10)),
            NliDataset::new(items(6)),
            &options,
            &device,
            CheckpointManager::new(dir).unwrap(),
        )
    }

    #[test]
    fn test_train_and_validate_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(dir.path());

        let train = trainer.train_epoch(1, 4e-4).unwrap();
        assert!(train.loss.is_finite());
        assert!((0.0..=1.0).contains(&train.accuracy));

        let valid = trainer.validate().unwrap();
        assert!(valid.loss.is_finite());
        assert!((0.0..=1.0).contains(&valid.f1));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(dir.path());
        let a = trainer.validate().unwrap();
        let b = trainer.validate().unwrap();
        assert_eq!(a.loss, b.loss);
        assert_eq!(a.f1, b.f1);
    }

    #[test]
    fn test_persist_writes_both_slots() {
        use crate::domain::checkpoint::{SchedulerState, TrainingState};

        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(dir.path());

        trainer.persist(&Checkpoint::WeightsOnly { state: TrainingState::new(0) }).unwrap();
        trainer
            .persist(&Checkpoint::Resumable {
                state: TrainingState::new(0),
                scheduler: SchedulerState { learning_rate: 4e-4, best: None, bad_epochs: 0 },
                patience_counter: 0,
            })
            .unwrap();

        assert!(dir.path().join("best_0.json").exists());
        assert!(dir.path().join("best_0.mpk").exists());
        assert!(dir.path().join("latest_0.json").exists());
        assert!(dir.path().join("latest_0.mpk").exists());
        assert!(dir.path().join("latest_0_optim.mpk").exists());

        // restored into a fresh model and optimizer
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let fresh = EsimConfig::new(10, 4, 3).init::<TestBackend>(&Default::default());
        let restored = manager
            .load_latest(0, fresh, adam::<TestBackend>(10.0), &Default::default())
            .unwrap();
        assert!(restored.is_some());
        let missing = manager
            .load_latest(1, trainer.model().clone(), adam::<TestBackend>(10.0), &Default::default())
            .unwrap();
        assert!(missing.is_none());
    }
}
