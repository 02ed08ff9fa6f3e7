// ============================================================
// Layer 3 — Special Tokens
// ============================================================
// The reserved ids of the vocabulary. They are resolved once
// from the tokenizer at configuration time and never change
// during a run.
//
// BERT/ELECTRA convention (used when we build our own vocab):
//   [PAD]=0  [UNK]=100  [CLS]=101  [SEP]=102  [MASK]=103

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub pad:  u32,
    pub unk:  u32,
    pub cls:  u32,
    pub sep:  u32,
    pub mask: u32,
}

impl SpecialTokens {
    pub const PAD:  &'static str = "[PAD]";
    pub const UNK:  &'static str = "[UNK]";
    pub const CLS:  &'static str = "[CLS]";
    pub const SEP:  &'static str = "[SEP]";
    pub const MASK: &'static str = "[MASK]";

    /// Every special id, deduplicated, in ascending order.
    /// This is the set the masker refuses to select.
    pub fn all_ids(&self) -> Vec<u32> {
        let mut ids = vec![self.pad, self.unk, self.cls, self.sep, self.mask];
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn is_special(&self, id: u32) -> bool {
        id == self.pad || id == self.unk || id == self.cls || id == self.sep || id == self.mask
    }
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self { pad: 0, unk: 100, cls: 101, sep: 102, mask: 103 }
    }
}
