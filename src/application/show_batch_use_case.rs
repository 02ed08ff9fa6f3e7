// ============================================================
// Layer 2 — ShowBatchUseCase
// ============================================================
// Builds the first batch of the corpus exactly as training
// would, masks it once and returns the rendering. Useful to
// check the tokenizer, the example builder and the masking
// probability before committing to a long run.

use anyhow::Result;
use burn::{
    backend::NdArray,
    data::{dataloader::batcher::Batcher, dataset::Dataset},
};

use crate::application::train_use_case::{prepare_corpus, run_rng, PretrainConfig};
use crate::data::{batcher::PretrainBatcher, dataset::TokenSequence};
use crate::domain::traits::TokenEncoder;
use crate::ml::mlm_hook::{MaskedLmHook, ShowBatchOptions};

// masking and rendering run host-side, no GPU needed
type ShowBackend = NdArray;

pub struct ShowBatchUseCase {
    config:  PretrainConfig,
    options: ShowBatchOptions,
}

impl ShowBatchUseCase {
    pub fn new(config: PretrainConfig, options: ShowBatchOptions) -> Self {
        Self { config, options }
    }

    pub fn execute(&self) -> Result<String> {
        let cfg = &self.config;
        cfg.validate()?;
        let mut rng = run_rng(cfg.seed);
        let corpus = prepare_corpus(cfg, &mut rng)?;

        let take  = cfg.batch_size.min(corpus.dataset.len());
        let items: Vec<TokenSequence> = (0..take).filter_map(|i| corpus.dataset.get(i)).collect();
        let batch = Batcher::<ShowBackend, _, _>::batch(
            &PretrainBatcher::new(corpus.special.pad, cfg.max_length),
            items,
            &Default::default(),
        );

        let masking = cfg.masking_config(corpus.vocab_size, &corpus.special);
        let mut hook = match cfg.seed {
            Some(seed) => MaskedLmHook::with_seed(masking, false, seed)?,
            None => MaskedLmHook::new(masking, false)?,
        };
        Ok(hook.show_batch(batch.input_ids, &self.options, Some(&corpus.tokenizer as &dyn TokenEncoder))?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_first_batch() {
        let corpus = tempfile::tempdir().unwrap();
        let ckpt   = tempfile::tempdir().unwrap();
        std::fs::write(corpus.path().join("a.txt"), "alpha beta gamma\ndelta epsilon\n").unwrap();

        let mut cfg = PretrainConfig::default();
        cfg.corpus_dir     = corpus.path().display().to_string();
        cfg.checkpoint_dir = ckpt.path().display().to_string();
        cfg.seed           = Some(1);
        cfg.mask_prob      = 1.0;

        let options = ShowBatchOptions { max_rows: Some(1), ..Default::default() };
        let out = ShowBatchUseCase::new(cfg, options).execute().unwrap();
        assert!(out.contains("[CLS]"));
        assert!(out.contains("y:"));
    }
}
