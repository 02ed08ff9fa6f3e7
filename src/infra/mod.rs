// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs      — Saving and loading model weights
//                        with Burn's CompactRecorder, plus the
//                        run's PretrainConfig as JSON.
//
//   tokenizer_store.rs — Tokenizer persistence. Loads a saved
//                        tokenizer.json or builds a word-level
//                        BERT-convention vocabulary from the
//                        corpus, and resolves the special ids.
//
//   metrics.rs         — Training metrics logging. Writes
//                        windowed step metrics to a CSV file.
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
