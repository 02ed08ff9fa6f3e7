// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Manages the vocabulary used for pretraining.
//
// If <dir>/tokenizer.json exists (e.g. a BERT WordPiece
// tokenizer dropped in by hand) it is loaded as is. Otherwise a
// word-level vocabulary is built from the corpus and written in
// HuggingFace JSON format, bypassing the trainer type mismatch
// of tokenizers 0.15.
//
// Built vocabularies follow the BERT id convention:
//   [PAD]=0  [UNK]=100  [CLS]=101  [SEP]=102  [MASK]=103
// and ordinary words fill every other id densely from 1.

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf};
use tokenizers::Tokenizer;

use crate::domain::special_tokens::SpecialTokens;
use crate::domain::traits::TokenEncoder;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load existing tokenizer or build a new one from lines
    pub fn load_or_build(&self, lines: &[String], vocab_size: usize) -> Result<Tokenizer> {
        let tok_path = self.dir.join("tokenizer.json");
        if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(lines, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join("tokenizer.json");
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    fn build_and_save(&self, lines: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let special = SpecialTokens::default();

        // ── Step 1: Word frequencies ──────────────────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for line in lines {
            for word in line.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        // most frequent first, ties alphabetical so rebuilds are stable
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(special.all_ids().len()));

        // ── Step 2: Vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (name, id) in special_entries(&special) {
            vocab.insert(name.to_string(), serde_json::json!(id));
        }
        let mut free_ids = (0u32..).filter(|id| !special.is_special(*id));
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                if let Some(id) = free_ids.next() {
                    vocab.insert(word.clone(), serde_json::json!(id));
                }
            }
        }
        let vocab_len = vocab.len();

        // ── Step 3: Tokenizer JSON in HuggingFace format ──────────────────────
        let added_tokens: Vec<serde_json::Value> = special_entries(&special)
            .iter()
            .map(|(name, id)| serde_json::json!({
                "id": id, "content": name, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": SpecialTokens::UNK
            }
        });

        let tok_path = self.dir.join("tokenizer.json");
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!("Tokenizer built with {} entries, saved to '{}'", vocab_len, tok_path.display());

        Tokenizer::from_file(&tok_path).map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

fn special_entries(special: &SpecialTokens) -> [(&'static str, u32); 5] {
    [
        (SpecialTokens::PAD,  special.pad),
        (SpecialTokens::UNK,  special.unk),
        (SpecialTokens::CLS,  special.cls),
        (SpecialTokens::SEP,  special.sep),
        (SpecialTokens::MASK, special.mask),
    ]
}

/// Resolve the special ids from a tokenizer's vocabulary.
pub fn special_tokens(tokenizer: &Tokenizer) -> Result<SpecialTokens> {
    let id = |name: &str| {
        tokenizer
            .token_to_id(name)
            .with_context(|| format!("Tokenizer has no '{name}' token"))
    };
    Ok(SpecialTokens {
        pad:  id(SpecialTokens::PAD)?,
        unk:  id(SpecialTokens::UNK)?,
        cls:  id(SpecialTokens::CLS)?,
        sep:  id(SpecialTokens::SEP)?,
        mask: id(SpecialTokens::MASK)?,
    })
}

/// One past the largest id, so sparse vocabularies still index safely.
pub fn model_vocab_size(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .max()
        .map_or(0, |&max| max as usize + 1)
}

impl TokenEncoder for Tokenizer {
    fn encode_line(&self, line: &str) -> Result<Vec<u32>> {
        let enc = self
            .encode(line, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    fn token_name(&self, id: u32) -> Option<String> {
        self.id_to_token(id)
    }
}
