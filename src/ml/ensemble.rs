// ============================================================
// Layer 5 — Ensemble Predictor
// ============================================================
// Combines the best checkpoint of every fold into one label per
// test example.
//
// For each fold f = 0..K:
//   load best_{f}, run inference over the test set in file order,
//   add its probability rows to a running sum and count a vote
//   for every example whose argmax is the positive class.
//
// Decision for an example with z positive votes out of K:
//
//   2z < K  →  0
//   2z > K  →  1
//   2z = K  →  argmax of the summed probabilities
//              (lowest class index wins an exact tie)
//
// Batches are cut from the dataset directly rather than through
// a multi-worker DataLoader, so predictions stay in file order.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::{batcher::NliBatcher, dataset::NliItem};
use crate::domain::{corpus::EncodedDataset, error::PipelineError};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{EsimConfig, EsimModel};

const POSITIVE: usize = 1;

/// Index of the first maximal entry.
pub fn argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

// ─── Aggregation ──────────────────────────────────────────────────────────────
/// Running probability sums and positive votes across folds.
#[derive(Debug, Clone, Default)]
pub struct EnsembleAggregator {
    probability_sums: Vec<Vec<f64>>,
    positive_votes:   Vec<usize>,
    folds_seen:       usize,
}

impl EnsembleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fold's probability rows (one row per example).
    pub fn add_fold(&mut self, fold: usize, probabilities: &[Vec<f32>]) -> Result<(), PipelineError> {
        if self.folds_seen == 0 {
            self.probability_sums = probabilities
                .iter()
                .map(|row| vec![0.0; row.len()])
                .collect();
            self.positive_votes = vec![0; probabilities.len()];
        } else if probabilities.len() != self.positive_votes.len() {
            return Err(PipelineError::PredictionShapeMismatch {
                fold,
                expected: self.positive_votes.len(),
                found:    probabilities.len(),
            });
        }

        for (i, row) in probabilities.iter().enumerate() {
            let sums = &mut self.probability_sums[i];
            if row.len() != sums.len() {
                return Err(PipelineError::PredictionShapeMismatch {
                    fold,
                    expected: sums.len(),
                    found:    row.len(),
                });
            }
            for (sum, &p) in sums.iter_mut().zip(row) {
                *sum += f64::from(p);
            }
            if argmax(row) == POSITIVE {
                self.positive_votes[i] += 1;
            }
        }

        self.folds_seen += 1;
        Ok(())
    }

    /// Final label per example.
    pub fn labels(&self) -> Result<Vec<usize>, PipelineError> {
        let k = self.folds_seen;
        if k == 0 {
            return Err(PipelineError::NoFolds);
        }

        let labels = self
            .positive_votes
            .iter()
            .zip(&self.probability_sums)
            .map(|(&z, sums)| match (2 * z).cmp(&k) {
                std::cmp::Ordering::Less    => 0,
                std::cmp::Ordering::Greater => POSITIVE,
                std::cmp::Ordering::Equal   => argmax(sums),
            })
            .collect();
        Ok(labels)
    }
}

// ─── Inference ────────────────────────────────────────────────────────────────

/// Softmax rows for every item, in input order.
pub fn predict_probabilities<B: Backend>(
    model:      &EsimModel<B>,
    items:      &[NliItem],
    batch_size: usize,
    device:     &B::Device,
) -> Vec<Vec<f32>> {
    let batcher = NliBatcher::<B>::new(device.clone());
    let mut rows = Vec::with_capacity(items.len());

    for chunk in items.chunks(batch_size.max(1)) {
        let batch = batcher.batch(chunk.to_vec());
        let output = model.forward(
            batch.premises,
            batch.premise_mask,
            batch.hypotheses,
            batch.hypothesis_mask,
        );
        let [_, classes] = output.probabilities.dims();
        let flat: Vec<f32> = output.probabilities.into_data().iter::<f32>().collect();
        rows.extend(flat.chunks(classes).map(<[f32]>::to_vec));
    }
    rows
}

/// Loads each fold's best checkpoint and votes.
pub struct EnsemblePredictor<B: Backend> {
    checkpoints: CheckpointManager,
    config:      EsimConfig,
    batch_size:  usize,
    device:      B::Device,
}

impl<B: Backend> EnsemblePredictor<B> {
    pub fn new(checkpoints: CheckpointManager, config: EsimConfig, batch_size: usize, device: B::Device) -> Self {
        Self { checkpoints, config, batch_size, device }
    }

    pub fn predict(&self, data: &EncodedDataset, folds: usize) -> Result<Vec<usize>> {
        let items: Vec<NliItem> = data
            .examples()
            .map(|e| NliItem { premise: e.premise, hypothesis: e.hypothesis, label: e.label })
            .collect();

        let mut aggregator = EnsembleAggregator::new();
        for fold in 0..folds {
            let model = self.config.init::<B>(&self.device);
            let (model, _) = self.checkpoints.load_best(fold, model, &self.device)?;

            let probabilities = predict_probabilities(&model, &items, self.batch_size, &self.device);
            aggregator.add_fold(fold, &probabilities)?;
            tracing::info!("Fold {}: predicted {} examples", fold, probabilities.len());
        }

        Ok(aggregator.labels()?)
    }
}
