// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The model, the training loop and everything that decides
// what happens from one epoch to the next.
//
//   model.rs            — ESIM: BiLSTM encoding, soft alignment,
//                         enhancement, composition, pooling and
//                         the MLP classifier
//
//   trainer.rs          — FoldTrainer: one fold's model, Adam
//                         optimizer and data loaders; implements
//                         EpochRunner (train / validate / persist)
//
//   controller.rs       — The per-fold epoch state machine with
//                         early stopping and checkpoint policy
//
//   scheduler.rs        — Reduce-on-plateau learning rate
//
//   metrics.rs          — Accuracy and binary F1 counts
//
//   cross_validation.rs — Runs the controller once per fold
//
//   ensemble.rs         — Majority vote over fold checkpoints
//                         with the summed-probability tie-break
//
//   backend.rs          — cpu / gpu backend selection
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Chen et al. (2017) ESIM

/// ESIM model architecture
pub mod model;

/// Per-fold train / validate / persist
pub mod trainer;

/// Epoch state machine with early stopping
pub mod controller;

/// Reduce-on-plateau learning rate schedule
pub mod scheduler;

/// Accuracy and F1
pub mod metrics;

/// K-fold orchestration
pub mod cross_validation;

/// Fold ensemble for the test set
pub mod ensemble;

/// Backend and device selection
pub mod backend;
