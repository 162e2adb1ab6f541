// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw CSV corpus to tensor batches.
//
//   question.csv + train.csv / test.csv
//       │
//       ▼
//   loader          → joins pair ids against the question table
//       │
//       ▼
//   preprocessor    → normalises and tokenises each sentence
//       │
//       ▼
//   Vocabulary      → (domain) token ids, BOS/EOS, OOV
//       │
//       ▼
//   transformer     → encodes a split, applies the label policy
//       │
//       ▼
//   splitter        → K disjoint folds of example indices
//       │
//       ▼
//   dataset         → implements Burn's Dataset trait
//       │
//       ▼
//   batcher         → pads pairs into tensor batches
//
// embeddings builds the pretrained matrix aligned to the
// vocabulary; it feeds the model's embedding layer.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the question table and the labelled pair files
pub mod loader;

/// Cleans and tokenises raw sentences
pub mod preprocessor;

/// Encodes a corpus split with the vocabulary
pub mod transformer;

/// Aligns pretrained word vectors to vocabulary ids
pub mod embeddings;

/// Implements Burn's Dataset trait for encoded pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create padded batches
pub mod batcher;

/// K-fold partitioning of example indices
pub mod splitter;
