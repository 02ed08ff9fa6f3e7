// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Loads plain-text pretraining documents from a directory.
//
// Convention: one document per .txt file, one sentence or
// paragraph per line. Anything else in the directory is
// ignored, and a file that cannot be read as UTF-8 is skipped
// with a warning rather than aborting the whole corpus.
//
// Files are visited in sorted order so a seeded run sees the
// documents in the same order on every machine.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::document::Document;
use crate::domain::traits::CorpusSource;

/// Loads all .txt files from a given directory.
pub struct TextCorpusLoader {
    dir: PathBuf,
}

impl TextCorpusLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CorpusSource for TextCorpusLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        if !self.dir.exists() {
            tracing::warn!(
                "Corpus directory '{}' does not exist, returning empty corpus",
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .collect();
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            match load_single_text(&path) {
                Ok(doc) if doc.is_blank() => {
                    tracing::debug!("Skipping empty file '{}'", path.display());
                }
                Ok(doc) => {
                    tracing::debug!("Loaded: {} ({} words)", doc.source, doc.word_count());
                    docs.push(doc);
                }
                Err(e) => {
                    tracing::warn!("Skipping '{}': {:#}", path.display(), e);
                }
            }
        }

        tracing::info!("Loaded {} documents from '{}'", docs.len(), self.dir.display());
        Ok(docs)
    }
}

fn load_single_text(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}' as UTF-8 text", path.display()))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(Document::new(source, text))
}
