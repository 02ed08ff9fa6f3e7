// ============================================================
// Layer 4 — Pretraining Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<TokenSequence>
// into one [batch, seq_len] Int tensor of clean token ids.
//
// Padding is dynamic: every row is right-padded with the pad id
// up to the longest example of THIS batch, never beyond
// `max_seq_len`. Masking is not done here; the MLM hook masks
// the clean batch at the start of each training step.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::TokenSequence;

// ─── TokenBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TokenBatch<B: Backend> {
    /// Clean token ids, shape [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,
}

// ─── PretrainBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct PretrainBatcher {
    pad_token_id: u32,
    max_seq_len:  usize,
}

impl PretrainBatcher {
    pub fn new(pad_token_id: u32, max_seq_len: usize) -> Self {
        Self { pad_token_id, max_seq_len }
    }

    /// Row-major padded ids and the resulting [rows, cols] shape.
    pub fn pad(&self, items: &[TokenSequence]) -> (Vec<i64>, [usize; 2]) {
        let seq_len = items
            .iter()
            .map(TokenSequence::len)
            .max()
            .unwrap_or(0)
            .min(self.max_seq_len);

        let mut flat = Vec::with_capacity(items.len() * seq_len);
        for item in items {
            let take = item.len().min(seq_len);
            flat.extend(item.input_ids[..take].iter().map(|&id| id as i64));
            flat.extend(std::iter::repeat(self.pad_token_id as i64).take(seq_len - take));
        }
        (flat, [items.len(), seq_len])
    }
}

impl<B: Backend> Batcher<B, TokenSequence, TokenBatch<B>> for PretrainBatcher {
    fn batch(&self, items: Vec<TokenSequence>, device: &B::Device) -> TokenBatch<B> {
        let (flat, shape) = self.pad(&items);
        let input_ids = Tensor::<B, 2, Int>::from_data(TensorData::new(flat, shape), device);
        TokenBatch { input_ids }
    }
}
