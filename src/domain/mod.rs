// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that name the concepts
// of ELECTRA pretraining:
//
//   document.rs       — a raw text document from the corpus
//   special_tokens.rs — the reserved token ids ([PAD], [CLS] ...)
//   traits.rs         — abstractions other layers implement
//   error.rs          — the typed error taxonomy of the core
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A loaded text document from disk
pub mod document;

// Reserved vocabulary ids that must never be masked
pub mod special_tokens;

// Core abstractions (traits) that other layers implement
pub mod traits;

// Configuration and batch-contract errors
pub mod error;
