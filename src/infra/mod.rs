// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by the preprocessing, training and test
// workflows:
//
//   artifact_store.rs — JSON artifacts written by preprocessing
//                       (vocabulary, encoded datasets, embedding
//                       matrix), loaded instead of rebuilt when
//                       they already exist.
//
//   checkpoint.rs     — Per-fold best / latest checkpoints.
//                       Burn recorders for weights and optimizer
//                       state, JSON for the bookkeeping, plus the
//                       model config so inference can rebuild
//                       the architecture.
//
//   metrics.rs        — Per-epoch metrics appended to a CSV
//                       file for later plotting.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Preprocessing artifacts on disk
pub mod artifact_store;

/// Fold checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
