// ============================================================
// Layer 5 — K-Fold Cross-Validator
// ============================================================
// Splits the training examples with data::splitter::KFold and
// hands each fold to a caller-supplied closure that builds a
// fresh model, trains it under an EpochController and returns
// the FoldOutcome. The validator only sequences folds and
// reports the mean of their best validation F1 scores.
//
// Folds run one after another; each writes fold-indexed
// checkpoints so nothing is shared between them.

use anyhow::Result;

use crate::data::splitter::{FoldSplit, KFold};
use crate::domain::error::PipelineError;
use crate::ml::controller::FoldOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldOutcome>,
}

impl CrossValidationReport {
    pub fn scores(&self) -> Vec<f64> {
        self.folds.iter().map(|f| f.best_score).collect()
    }

    pub fn mean_score(&self) -> Result<f64, PipelineError> {
        if self.folds.is_empty() {
            return Err(PipelineError::NoFolds);
        }
        Ok(self.folds.iter().map(|f| f.best_score).sum::<f64>() / self.folds.len() as f64)
    }
}

pub struct CrossValidator {
    kfold: KFold,
}

impl CrossValidator {
    pub fn new(kfold: KFold) -> Self {
        Self { kfold }
    }

    pub fn run<F>(&self, samples: usize, mut run_fold: F) -> Result<CrossValidationReport>
    where
        F: FnMut(&FoldSplit) -> Result<FoldOutcome>,
    {
        let splits = self.kfold.split(samples)?;
        tracing::info!("Cross-validating {} examples over {} folds", samples, self.kfold.folds());

        let mut folds = Vec::with_capacity(splits.len());
        for split in &splits {
            tracing::info!(
                "── Fold {}/{} ── train={} valid={}",
                split.fold + 1, splits.len(), split.train.len(), split.valid.len(),
            );
            let outcome = run_fold(split)?;
            tracing::info!("Fold {} best F1: {:.4}", split.fold, outcome.best_score);
            folds.push(outcome);
        }

        let report = CrossValidationReport { folds };
        tracing::info!(
            "Cross-validation F1 per fold: {:?}, mean {:.4}",
            report.scores(),
            report.mean_score()?,
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checkpoint::TrainingHistory;

    fn outcome(fold: usize, best_score: f64) -> FoldOutcome {
        FoldOutcome {
            fold,
            best_score,
            epochs_run: 1,
            stopped_early: false,
            history: TrainingHistory::default(),
        }
    }

    #[test]
    fn test_runs_every_fold_and_averages() {
        let mut seen = Vec::new();
        let report = CrossValidator::new(KFold::new(4))
            .run(10, |split| {
                seen.push(split.valid.clone());
                Ok(outcome(split.fold, 0.5 + 0.1 * split.fold as f64))
            })
            .unwrap();

        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], vec![0, 1, 2]);
        assert_eq!(report.scores().len(), 4);
        assert!((report.mean_score().unwrap() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_fold_error_aborts() {
        let mut calls = 0;
        let result = CrossValidator::new(KFold::new(3)).run(9, |split| {
            calls += 1;
            if split.fold == 1 {
                anyhow::bail!("boom");
            }
            Ok(outcome(split.fold, 0.5))
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_invalid_fold_count_is_typed() {
        let err = CrossValidator::new(KFold::new(5))
            .run(3, |split| Ok(outcome(split.fold, 0.0)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidFoldCount { folds: 5, samples: 3 })
        ));
    }
}
