// ============================================================
// Layer 3 — Checkpoint Domain Types
// ============================================================
// A checkpoint is one concept with two variants:
//
//   WeightsOnly — "best" checkpoint. Model weights plus
//                 bookkeeping, written whenever validation F1
//                 matches or beats the best so far.
//   Resumable   — "latest" checkpoint. Everything WeightsOnly
//                 has plus optimizer and scheduler state,
//                 written after every epoch.
//
// Only the metadata lives here; the tensors themselves are
// written next to it by the checkpoint manager (Layer 6).

use serde::{Deserialize, Serialize};

/// Loss curves, one entry per completed epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs_count: Vec<usize>,
    pub train_losses: Vec<f64>,
    pub valid_losses: Vec<f64>,
}

impl TrainingHistory {
    pub fn record(&mut self, epoch: usize, train_loss: f64, valid_loss: f64) {
        self.epochs_count.push(epoch);
        self.train_losses.push(train_loss);
        self.valid_losses.push(valid_loss);
    }

    pub fn len(&self) -> usize {
        self.epochs_count.len()
    }
}

/// Bookkeeping shared by both checkpoint variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub fold:       usize,
    /// Last completed epoch (1-based, 0 before any training)
    pub epoch:      usize,
    pub best_score: f64,
    pub history:    TrainingHistory,
}

impl TrainingState {
    pub fn new(fold: usize) -> Self {
        Self {
            fold,
            epoch: 0,
            best_score: 0.0,
            history: TrainingHistory::default(),
        }
    }
}

/// Reduce-on-plateau scheduler state (see ml::scheduler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub learning_rate: f64,
    /// None until the first metric is observed
    pub best:          Option<f64>,
    pub bad_epochs:    usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Checkpoint {
    WeightsOnly {
        state: TrainingState,
    },
    Resumable {
        state:            TrainingState,
        scheduler:        SchedulerState,
        patience_counter: usize,
    },
}

impl Checkpoint {
    pub fn state(&self) -> &TrainingState {
        match self {
            Checkpoint::WeightsOnly { state } | Checkpoint::Resumable { state, .. } => state,
        }
    }

    pub fn is_resumable(&self) -> bool {
        matches!(self, Checkpoint::Resumable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json() {
        let ckpt = Checkpoint::WeightsOnly { state: TrainingState::new(3) };
        let json = serde_json::to_value(&ckpt).unwrap();
        assert_eq!(json["kind"], "weights_only");
        assert_eq!(json["state"]["fold"], 3);
    }

    #[test]
    fn test_resumable_round_trip() {
        let mut state = TrainingState::new(1);
        state.epoch = 4;
        state.best_score = 0.75;
        state.history.record(4, 0.3, 0.4);
        let ckpt = Checkpoint::Resumable {
            state,
            scheduler: SchedulerState { learning_rate: 2e-4, best: Some(0.75), bad_epochs: 0 },
            patience_counter: 1,
        };
        let back: Checkpoint =
            serde_json::from_str(&serde_json::to_string(&ckpt).unwrap()).unwrap();
        assert!(back.is_resumable());
        assert_eq!(back, ckpt);
        assert_eq!(back.state().history.len(), 1);
    }
}
