// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so a
// different corpus format or tokenizer can be swapped in
// without touching the training pipeline.

use anyhow::Result;
use crate::domain::document::Document;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can produce the raw pretraining documents.
///
/// Implementations:
///   - TextCorpusLoader → every .txt file in a directory
pub trait CorpusSource {
    /// Load all available documents from this source.
    fn load_all(&self) -> Result<Vec<Document>>;
}

// ─── TokenEncoder ─────────────────────────────────────────────────────────────
/// Anything that turns a line of text into vocabulary ids
/// and can name an id again for diagnostics.
///
/// Implementations:
///   - tokenizers::Tokenizer (see infra::tokenizer_store)
pub trait TokenEncoder {
    fn encode_line(&self, line: &str) -> Result<Vec<u32>>;

    fn token_name(&self, id: u32) -> Option<String>;
}
