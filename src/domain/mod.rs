// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing the core
// concepts of the system:
//
//   vocabulary  — token ↔ id mapping and the sentence encoder
//   corpus      — raw and encoded sentence-pair datasets
//   checkpoint  — best / latest checkpoint metadata
//   traits      — the EpochRunner seam used by the controller
//   error       — typed pipeline failures
//
// No Burn types and no file I/O in this layer.

pub mod checkpoint;

pub mod corpus;

pub mod error;

pub mod traits;

pub mod vocabulary;
