// ============================================================
// Layer 3 — Core Error Taxonomy
// ============================================================
// Two families, both fatal for the current step:
//   - configuration errors, raised when a component is built
//   - batch-contract errors, raised when a tensor does not have
//     the shape or values the component was promised
//
// The outer layers wrap these in anyhow with context.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElectraError {
    #[error("Masking probability must be in (0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("Vocabulary size must be positive")]
    EmptyVocabulary,

    #[error("Token id {id} is outside the vocabulary of size {vocab_size}")]
    TokenOutOfVocab { id: i64, vocab_size: usize },

    #[error("Batch is empty: shape {0:?}")]
    EmptyBatch([usize; 2]),

    #[error("Cannot read tensor data: {0}")]
    TensorRead(String),

    #[error("Either warmup_pct or warmup_steps must be set")]
    MissingWarmup,

    #[error("Invalid schedule configuration: {0}")]
    InvalidSchedule(String),

    #[error("Invalid loss configuration: {0}")]
    InvalidLoss(String),

    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what:     &'static str,
        expected: Vec<usize>,
        actual:   Vec<usize>,
    },

    #[error("The replaced-token-detection model needs the untouched mask, but the masking hook was built without it")]
    MissingIgnoreMask,
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ElectraError>;

impl ElectraError {
    pub fn shape(what: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            actual:   actual.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_message() {
        let e = ElectraError::shape("labels", &[2, 7], &[2, 8]);
        assert_eq!(
            e.to_string(),
            "Shape mismatch for labels: expected [2, 7], got [2, 8]"
        );
    }
}
