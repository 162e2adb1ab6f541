// ============================================================
// Layer 5 — Epoch Controller
// ============================================================
// Drives one fold through its epochs as an explicit state
// machine:
//
//   Initializing ──▶ TrainingEpoch ──▶ ValidatingEpoch ──▶ Checkpointing
//                          ▲                                    │
//                          └────────────── next epoch ──────────┤
//                                                               ├──▶ EarlyStopped
//                                                               └──▶ Completed
//
// Initializing    one validation pass with the untrained (or
//                 resumed) weights, logged as the baseline
// TrainingEpoch   runner.train_epoch at the scheduler's rate
// ValidatingEpoch runner.validate, then scheduler.step(F1)
// Checkpointing   F1 >= best → reset patience, persist best
//                 otherwise  → patience + 1
//                 always     → persist latest (resumable)
//
// The fold stops early once the number of consecutive
// non-improving epochs is strictly greater than `patience`,
// and completes when the epoch budget is used up.
//
// Everything model-specific sits behind EpochRunner, so the
// controller is exercised in tests with a scripted runner.

use anyhow::{bail, Result};

use crate::domain::{
    checkpoint::{Checkpoint, TrainingHistory, TrainingState},
    traits::{EpochRunner, EpochSummary},
};
use crate::infra::metrics::{EpochMetrics, MetricsSink};
use crate::ml::scheduler::ReduceLrOnPlateau;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    TrainingEpoch,
    ValidatingEpoch,
    Checkpointing,
    EarlyStopped,
    Completed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::EarlyStopped | Phase::Completed)
    }
}

/// How a fold run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub fold:          usize,
    pub best_score:    f64,
    /// Last completed epoch
    pub epochs_run:    usize,
    pub stopped_early: bool,
    pub history:       TrainingHistory,
}

pub struct EpochController {
    epochs:           usize,
    patience:         usize,
    phase:            Phase,
    state:            TrainingState,
    scheduler:        ReduceLrOnPlateau,
    patience_counter: usize,
    // Carried between phases of the epoch in flight
    epoch_lr:         f64,
    last_train:       Option<EpochSummary>,
    last_f1:          f64,
    last_valid_loss:  f64,
    last_valid_acc:   f64,
}

impl EpochController {
    /// Fresh fold starting at epoch 1.
    pub fn new(fold: usize, epochs: usize, patience: usize, learning_rate: f64) -> Self {
        Self {
            epochs,
            patience,
            phase: Phase::Initializing,
            state: TrainingState::new(fold),
            scheduler: ReduceLrOnPlateau::new(learning_rate),
            patience_counter: 0,
            epoch_lr: learning_rate,
            last_train: None,
            last_f1: 0.0,
            last_valid_loss: 0.0,
            last_valid_acc: 0.0,
        }
    }

    /// Continue a fold from its latest checkpoint at epoch + 1.
    pub fn resume(checkpoint: &Checkpoint, epochs: usize, patience: usize) -> Result<Self> {
        let Checkpoint::Resumable { state, scheduler, patience_counter } = checkpoint else {
            bail!("fold {} checkpoint has no optimizer state to resume from", checkpoint.state().fold);
        };

        if state.history.len() != state.epoch {
            tracing::warn!(
                "Fold {}: checkpoint at epoch {} carries {} epochs of history",
                state.fold, state.epoch, state.history.len(),
            );
        }

        let mut controller = Self::new(state.fold, epochs, patience, scheduler.learning_rate);
        controller.state = state.clone();
        controller.scheduler = controller.scheduler.with_state(scheduler.clone());
        controller.patience_counter = *patience_counter;

        tracing::info!(
            "Fold {}: resuming after epoch {} (best F1 {:.4}, patience {}/{})",
            state.fold, state.epoch, state.best_score, patience_counter, patience,
        );
        Ok(controller)
    }

    /// Run until EarlyStopped or Completed.
    pub fn run<R, S>(mut self, runner: &mut R, sink: &mut S) -> Result<FoldOutcome>
    where
        R: EpochRunner,
        S: MetricsSink,
    {
        while !self.phase.is_terminal() {
            self.phase = self.advance(runner, sink)?;
        }

        let stopped_early = self.phase == Phase::EarlyStopped;
        if stopped_early {
            tracing::info!(
                "Fold {}: early stopping after epoch {} (best F1 {:.4})",
                self.state.fold, self.state.epoch, self.state.best_score,
            );
        } else {
            tracing::info!(
                "Fold {}: finished {} epochs (best F1 {:.4})",
                self.state.fold, self.state.epoch, self.state.best_score,
            );
        }

        Ok(FoldOutcome {
            fold: self.state.fold,
            best_score: self.state.best_score,
            epochs_run: self.state.epoch,
            stopped_early,
            history: self.state.history,
        })
    }

    fn advance<R, S>(&mut self, runner: &mut R, sink: &mut S) -> Result<Phase>
    where
        R: EpochRunner,
        S: MetricsSink,
    {
        let fold = self.state.fold;
        match self.phase {
            Phase::Initializing => {
                if self.patience_exceeded() {
                    return Ok(Phase::EarlyStopped);
                }
                if self.state.epoch >= self.epochs {
                    return Ok(Phase::Completed);
                }

                let baseline = runner.validate()?;
                tracing::info!(
                    "Fold {}: validation before training | loss={:.4} | accuracy={:.2}% | F1={:.4}",
                    fold, baseline.loss, baseline.accuracy * 100.0, baseline.f1,
                );
                Ok(Phase::TrainingEpoch)
            }

            Phase::TrainingEpoch => {
                let epoch = self.state.epoch + 1;
                self.epoch_lr = self.scheduler.learning_rate();

                tracing::info!("Fold {}: training epoch {}/{} (lr={:.2e})", fold, epoch, self.epochs, self.epoch_lr);
                let summary = runner.train_epoch(epoch, self.epoch_lr)?;
                tracing::info!(
                    "  train | {:.1}s | loss={:.4} | accuracy={:.2}%",
                    summary.elapsed.as_secs_f64(), summary.loss, summary.accuracy * 100.0,
                );
                self.last_train = Some(summary);
                Ok(Phase::ValidatingEpoch)
            }

            Phase::ValidatingEpoch => {
                let summary = runner.validate()?;
                tracing::info!(
                    "  valid | {:.1}s | loss={:.4} | accuracy={:.2}% | F1={:.4}",
                    summary.elapsed.as_secs_f64(), summary.loss, summary.accuracy * 100.0, summary.f1,
                );
                self.last_f1 = summary.f1;
                self.last_valid_loss = summary.loss;
                self.last_valid_acc = summary.accuracy;

                self.scheduler.step(summary.f1);
                Ok(Phase::Checkpointing)
            }

            Phase::Checkpointing => {
                let Some(train) = self.last_train.take() else {
                    bail!("fold {fold}: checkpointing before any training epoch");
                };
                let epoch = self.state.epoch + 1;
                self.state.epoch = epoch;
                self.state.history.record(epoch, train.loss, self.last_valid_loss);

                let metrics = EpochMetrics {
                    fold,
                    epoch,
                    train_loss: train.loss,
                    train_acc: train.accuracy,
                    valid_loss: self.last_valid_loss,
                    valid_acc: self.last_valid_acc,
                    valid_f1: self.last_f1,
                    learning_rate: self.epoch_lr,
                };
                sink.log(&metrics)?;

                if metrics.is_improvement(self.state.best_score) {
                    self.state.best_score = metrics.valid_f1;
                    self.patience_counter = 0;
                    runner.persist(&Checkpoint::WeightsOnly { state: self.state.clone() })?;
                    tracing::info!("  new best F1 {:.4}, saved best checkpoint", metrics.valid_f1);
                } else {
                    self.patience_counter += 1;
                    tracing::debug!("  no improvement ({}/{})", self.patience_counter, self.patience);
                }

                runner.persist(&Checkpoint::Resumable {
                    state: self.state.clone(),
                    scheduler: self.scheduler.state().clone(),
                    patience_counter: self.patience_counter,
                })?;

                if self.patience_exceeded() {
                    Ok(Phase::EarlyStopped)
                } else if epoch >= self.epochs {
                    Ok(Phase::Completed)
                } else {
                    Ok(Phase::TrainingEpoch)
                }
            }

            terminal @ (Phase::EarlyStopped | Phase::Completed) => Ok(terminal),
        }
    }

    fn patience_exceeded(&self) -> bool {
        self.patience_counter > self.patience
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{checkpoint::SchedulerState, traits::ValidationSummary};
    use crate::infra::metrics::NullSink;
    use std::{collections::VecDeque, time::Duration};

    /// Replays a fixed list of validation F1 scores.
    struct ScriptedRunner {
        baseline:  f64,
        scores:    VecDeque<f64>,
        validated: usize,
        trained:   Vec<(usize, f64)>,
        persisted: Vec<Checkpoint>,
    }

    impl ScriptedRunner {
        fn new(scores: &[f64]) -> Self {
            Self {
                baseline: 0.0,
                scores: scores.iter().copied().collect(),
                validated: 0,
                trained: Vec::new(),
                persisted: Vec::new(),
            }
        }

        fn best_epochs(&self) -> Vec<usize> {
            self.persisted
                .iter()
                .filter(|c| !c.is_resumable())
                .map(|c| c.state().epoch)
                .collect()
        }
    }

    impl EpochRunner for ScriptedRunner {
        fn train_epoch(&mut self, epoch: usize, learning_rate: f64) -> Result<EpochSummary> {
            self.trained.push((epoch, learning_rate));
            Ok(EpochSummary { elapsed: Duration::ZERO, loss: 1.0 / epoch as f64, accuracy: 0.5 })
        }

        fn validate(&mut self) -> Result<ValidationSummary> {
            let f1 = if self.validated == 0 {
                self.baseline
            } else {
                self.scores.pop_front().expect("script exhausted")
            };
            self.validated += 1;
            Ok(ValidationSummary { elapsed: Duration::ZERO, loss: 1.0 - f1, accuracy: f1, f1 })
        }

        fn persist(&mut self, checkpoint: &Checkpoint) -> Result<()> {
            self.persisted.push(checkpoint.clone());
            Ok(())
        }
    }

    struct VecSink(Vec<EpochMetrics>);

    impl MetricsSink for VecSink {
        fn log(&mut self, m: &EpochMetrics) -> Result<()> {
            self.0.push(m.clone());
            Ok(())
        }
    }

    #[test]
    fn test_early_stop_after_patience_exceeded() {
        let mut runner = ScriptedRunner::new(&[0.5, 0.6, 0.55, 0.55, 0.55, 0.9, 0.9]);
        let outcome = EpochController::new(0, 10, 2, 4e-4)
            .run(&mut runner, &mut NullSink)
            .unwrap();

        assert!(outcome.stopped_early);
        assert_eq!(outcome.epochs_run, 5);
        assert_eq!(outcome.best_score, 0.6);
        assert_eq!(runner.trained.len(), 5);
        assert_eq!(runner.best_epochs(), vec![1, 2]);
        assert_eq!(outcome.history.len(), 5);
    }

    #[test]
    fn test_completes_epoch_budget() {
        let mut runner = ScriptedRunner::new(&[0.1, 0.2, 0.3]);
        let mut sink = VecSink(Vec::new());
        let outcome = EpochController::new(2, 3, 1, 4e-4).run(&mut runner, &mut sink).unwrap();

        assert!(!outcome.stopped_early);
        assert_eq!(outcome.epochs_run, 3);
        assert_eq!(outcome.best_score, 0.3);
        // one latest per epoch, one best per improving epoch
        assert_eq!(runner.persisted.iter().filter(|c| c.is_resumable()).count(), 3);
        assert_eq!(runner.best_epochs(), vec![1, 2, 3]);
        assert_eq!(sink.0.len(), 3);
        assert!(sink.0.iter().all(|m| m.fold == 2));
    }

    #[test]
    fn test_equal_score_counts_as_improvement() {
        let mut runner = ScriptedRunner::new(&[0.5, 0.5, 0.5]);
        let outcome = EpochController::new(0, 3, 0, 4e-4)
            .run(&mut runner, &mut NullSink)
            .unwrap();
        assert!(!outcome.stopped_early);
        assert_eq!(runner.best_epochs(), vec![1, 2, 3]);
    }

    #[test]
    fn test_learning_rate_halves_on_plateau() {
        let mut runner = ScriptedRunner::new(&[0.5, 0.6, 0.55, 0.55]);
        EpochController::new(0, 4, 10, 4e-4).run(&mut runner, &mut NullSink).unwrap();
        let rates: Vec<f64> = runner.trained.iter().map(|&(_, lr)| lr).collect();
        assert_eq!(rates, vec![4e-4, 4e-4, 4e-4, 2e-4]);
    }

    #[test]
    fn test_resume_continues_at_next_epoch() {
        let mut state = TrainingState::new(1);
        state.epoch = 3;
        state.best_score = 0.7;
        for e in 1..=3 {
            state.history.record(e, 0.5, 0.5);
        }
        let checkpoint = Checkpoint::Resumable {
            state,
            scheduler: SchedulerState { learning_rate: 1e-4, best: Some(0.7), bad_epochs: 0 },
            patience_counter: 1,
        };

        let mut runner = ScriptedRunner::new(&[0.8, 0.75]);
        let outcome = EpochController::resume(&checkpoint, 5, 2)
            .unwrap()
            .run(&mut runner, &mut NullSink)
            .unwrap();

        assert_eq!(runner.trained, vec![(4, 1e-4), (5, 1e-4)]);
        assert_eq!(outcome.epochs_run, 5);
        assert_eq!(outcome.best_score, 0.8);
        assert_eq!(outcome.history.len(), 5);
    }

    #[test]
    fn test_resume_of_stopped_fold_does_nothing() {
        let checkpoint = Checkpoint::Resumable {
            state: TrainingState::new(0),
            scheduler: SchedulerState { learning_rate: 1e-4, best: None, bad_epochs: 0 },
            patience_counter: 3,
        };
        let mut runner = ScriptedRunner::new(&[]);
        let outcome = EpochController::resume(&checkpoint, 10, 2)
            .unwrap()
            .run(&mut runner, &mut NullSink)
            .unwrap();

        assert!(outcome.stopped_early);
        assert_eq!(runner.validated, 0);
        assert!(runner.trained.is_empty());
    }

    #[test]
    fn test_weights_only_cannot_resume() {
        let checkpoint = Checkpoint::WeightsOnly { state: TrainingState::new(0) };
        assert!(EpochController::resume(&checkpoint, 10, 2).is_err());
    }
}
