use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One pretraining example, unpadded.
/// Sequence format: [CLS] segment A [SEP] (segment B [SEP])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSequence {
    pub input_ids: Vec<u32>,
}

impl TokenSequence {
    pub fn new(input_ids: Vec<u32>) -> Self {
        Self { input_ids }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

pub struct PretrainDataset {
    sequences: Vec<TokenSequence>,
}

impl PretrainDataset {
    /// Empty sequences are dropped: they cannot be batched.
    pub fn new(sequences: Vec<TokenSequence>) -> Self {
        Self { sequences: sequences.into_iter().filter(|s| !s.is_empty()).collect() }
    }

    pub fn from_ids(examples: Vec<Vec<u32>>) -> Self {
        Self::new(examples.into_iter().map(TokenSequence::new).collect())
    }

    pub fn sample_count(&self) -> usize { self.sequences.len() }

    /// Total number of tokens, padding excluded
    pub fn token_count(&self) -> usize {
        self.sequences.iter().map(TokenSequence::len).sum()
    }
}

impl Dataset<TokenSequence> for PretrainDataset {
    fn get(&self, index: usize) -> Option<TokenSequence> {
        self.sequences.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.sequences.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_access() {
        let ds = PretrainDataset::from_ids(vec![vec![101, 7, 102], vec![101, 102]]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.token_count(), 5);
        assert_eq!(ds.get(1), Some(TokenSequence::new(vec![101, 102])));
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_empty_sequences_are_dropped() {
        let ds = PretrainDataset::from_ids(vec![vec![], vec![101, 102], vec![]]);
        assert_eq!(ds.sample_count(), 1);
        assert_eq!(ds.get(0), Some(TokenSequence::new(vec![101, 102])));
    }
}
