// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers, one use case per pipeline
// stage.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - No tensor code here (that's Layer 5)
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// CSV corpus → vocabulary, encoded datasets, embeddings
pub mod preprocess_use_case;

// k-fold training with early stopping
pub mod train_use_case;

// Ensemble labelling of the test set
pub mod test_use_case;
