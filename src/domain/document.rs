// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// One raw document of the pretraining corpus. ELECTRA examples
// never cross a document boundary, so the document is the unit
// the example builder flushes on.

use serde::{Deserialize, Serialize};

/// A raw text document loaded from disk, before cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The filename, kept for traceability in logs
    pub source: String,

    /// The full text content, one sentence or paragraph per line
    pub text: String,
}

impl Document {
    /// Create a new Document. Accepts &str or String for both fields.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
        }
    }

    /// True if the document has no visible characters at all
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Number of whitespace-separated words, used for corpus stats
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
