// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Typed failures that callers may want to match on.
// Everything else (plain I/O, JSON) travels as anyhow::Error
// with a context message naming the offending file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No line of the embedding file matched a vocabulary token,
    /// so the embedding dimension cannot be inferred.
    #[error("no vocabulary token has a pretrained vector in '{path}'")]
    NoPretrainedVectors { path: String },

    #[error("embedding for '{token}' has {found} values, expected {expected}")]
    EmbeddingDimMismatch {
        token:    String,
        expected: usize,
        found:    usize,
    },

    #[error("embedding row for '{token}' has a non-numeric value '{value}'")]
    MalformedEmbeddingRow { token: String, value: String },

    #[error("cannot split {samples} examples into {folds} folds (need 2 <= folds <= examples)")]
    InvalidFoldCount { folds: usize, samples: usize },

    #[error("checkpoint not found: '{path}'")]
    MissingCheckpoint { path: String },

    #[error("question id '{id}' is not present in the question table")]
    UnknownQuestionId { id: String },

    #[error("line {line} of '{path}' has no column {column}")]
    MissingColumn {
        path:   String,
        line:   usize,
        column: usize,
    },

    #[error("fold {fold} produced {found} predictions, expected {expected}")]
    PredictionShapeMismatch {
        fold:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("ensemble has no fold predictions to aggregate")]
    NoFolds,
}
