// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The epoch controller only needs three things from whatever
// trains the model: run one training epoch, run one validation
// pass, and persist a checkpoint. EpochRunner captures exactly
// that, so the early-stopping state machine can be driven by
// the Burn trainer in production and by a scripted runner in
// tests.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::time::Duration;

use anyhow::Result;

use crate::domain::checkpoint::Checkpoint;

/// Result of one pass over the training stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub elapsed:  Duration,
    /// Mean loss over batches
    pub loss:     f64,
    /// Correct predictions / total examples
    pub accuracy: f64,
}

/// Result of one pass over the held-out stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationSummary {
    pub elapsed:  Duration,
    pub loss:     f64,
    pub accuracy: f64,
    /// Binary F1 of the positive class over the whole pass
    pub f1:       f64,
}

// ─── EpochRunner ──────────────────────────────────────────────────────────────
/// Anything that can train and validate one model for one fold.
///
/// Implementations:
///   - ml::trainer::FoldTrainer → Burn model + Adam optimizer
///   - scripted runners in the controller tests
pub trait EpochRunner {
    /// One shuffled pass of forward / backward / clip / update.
    fn train_epoch(&mut self, epoch: usize, learning_rate: f64) -> Result<EpochSummary>;

    /// One unshuffled, gradient-free pass. Must not mutate weights.
    fn validate(&mut self) -> Result<ValidationSummary>;

    /// Write a checkpoint. The variant decides what goes to disk:
    /// WeightsOnly → best slot, Resumable → latest slot with optimizer state.
    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<()>;
}
