// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw .txt files all the
// way to clean token-id batches. Masking is NOT part of it:
// the MLM hook in the ml layer masks each batch per step.
//
// The pipeline flows in this order:
//
//   .txt files
//       │
//       ▼
//   TextCorpusLoader  → reads files, one Document each
//       │
//       ▼
//   Preprocessor      → cleans text into non-empty lines
//       │
//       ▼
//   Tokenizer         → converts each line to token ids
//       │
//       ▼
//   ExampleBuilder    → packs lines into [CLS] A [SEP] B [SEP]
//       │
//       ▼
//   PretrainDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   PretrainBatcher   → pads to the longest example per batch
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads .txt documents from a directory
pub mod loader;

/// Cleans raw text into sentence lines
pub mod preprocessor;

/// Packs tokenized lines into ELECTRA pretraining examples
pub mod examples;

/// Implements Burn's Dataset trait for token sequences
pub mod dataset;

/// Implements Burn's Batcher trait with dynamic padding
pub mod batcher;
