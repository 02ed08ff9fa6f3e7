// ============================================================
// Layer 5 — Dynamic Masker
// ============================================================
// Corrupts a batch of token ids for masked-LM supervision:
//
//   1. every non-special position is selected with probability p
//   2. selected positions keep their id as the label, all other
//      labels become the ignore sentinel (-100)
//   3. of the selected positions:
//        80%  → [MASK]
//        10%  → a uniformly random vocabulary id
//        10%  → left unchanged
//
// The 80/10/10 split comes from two nested coin flips
// (0.8, then 0.5 on what is left), not a single three-way draw.
// Each phase draws a full batch-shaped matrix in a fixed order,
// so one seed always reproduces the same corruption.
//
// The randomness source is an explicit `rand::Rng`, which keeps
// this a pure function of (ids, config, rng state).
//
// Reference: Devlin et al. (2019) BERT §3.1
//            Clark et al. (2020) ELECTRA §2

use burn::{prelude::*, tensor::TensorData};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::error::{ElectraError, Result};

/// Label value excluded from the generator loss
pub const IGNORE_INDEX: i64 = -100;

/// Share of selected positions replaced by the mask token
const MASK_TOKEN_PROB: f64 = 0.8;

/// Share of the remaining selected positions replaced by a random token
const RANDOM_TOKEN_PROB: f64 = 0.5;

// ─── MaskingConfig ────────────────────────────────────────────────────────────
/// Everything the masker needs besides the batch and the RNG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskingConfig {
    pub mask_token_id:     i64,
    pub special_token_ids: Vec<i64>,
    pub vocab_size:        usize,
    pub mlm_probability:   f64,
    pub ignore_index:      i64,
}

impl MaskingConfig {
    /// Masking probability defaults to 0.15, the ignore sentinel to -100.
    pub fn new(mask_token_id: i64, special_token_ids: Vec<i64>, vocab_size: usize) -> Self {
        Self {
            mask_token_id,
            special_token_ids,
            vocab_size,
            mlm_probability: 0.15,
            ignore_index:    IGNORE_INDEX,
        }
    }

    pub fn with_mlm_probability(mut self, mlm_probability: f64) -> Self {
        self.mlm_probability = mlm_probability;
        self
    }

    pub fn with_ignore_index(mut self, ignore_index: i64) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let p = self.mlm_probability;
        if !(p > 0.0 && p <= 1.0) {
            return Err(ElectraError::InvalidProbability(p));
        }
        if self.vocab_size == 0 {
            return Err(ElectraError::EmptyVocabulary);
        }
        self.check_in_vocab(self.mask_token_id)
    }

    fn is_special(&self, id: i64) -> bool {
        self.special_token_ids.contains(&id)
    }

    fn check_in_vocab(&self, id: i64) -> Result<()> {
        if id < 0 || id as u64 >= self.vocab_size as u64 {
            return Err(ElectraError::TokenOutOfVocab { id, vocab_size: self.vocab_size });
        }
        Ok(())
    }
}

// ─── Host-side masking ────────────────────────────────────────────────────────
/// Result of masking a flat row-major id buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedIds {
    /// Corrupted ids fed to the generator
    pub input_ids: Vec<i64>,
    /// Original id where masked, ignore sentinel elsewhere
    pub labels:    Vec<i64>,
    /// True where the position was NOT selected for masking
    pub untouched: Vec<bool>,
}

impl MaskedIds {
    pub fn num_masked(&self) -> usize {
        self.untouched.iter().filter(|&&u| !u).count()
    }
}

/// One Bernoulli draw per entry of `probabilities`.
fn bernoulli<R: Rng + ?Sized>(rng: &mut R, probabilities: &[f64]) -> Vec<bool> {
    probabilities.iter().map(|&p| rng.gen::<f64>() < p).collect()
}

/// Mask a flat buffer of token ids. Shape does not matter here:
/// every position is treated independently.
pub fn mask_token_ids<R: Rng + ?Sized>(
    ids:    &[i64],
    config: &MaskingConfig,
    rng:    &mut R,
) -> Result<MaskedIds> {
    config.validate()?;
    for &id in ids {
        config.check_in_vocab(id)?;
    }
    let n = ids.len();

    // ── Step 1: probability matrix, zero on special tokens ───────────────────
    let probability: Vec<f64> = ids
        .iter()
        .map(|&id| if config.is_special(id) { 0.0 } else { config.mlm_probability })
        .collect();

    // ── Step 2: which positions get masked-LM supervision ────────────────────
    let mlm_mask = bernoulli(rng, &probability);

    // ── Step 3: labels ───────────────────────────────────────────────────────
    let labels: Vec<i64> = ids
        .iter()
        .zip(&mlm_mask)
        .map(|(&id, &masked)| if masked { id } else { config.ignore_index })
        .collect();

    // ── Steps 4–5: the two nested coin flips ─────────────────────────────────
    let mask_coin   = bernoulli(rng, &vec![MASK_TOKEN_PROB; n]);
    let random_coin = bernoulli(rng, &vec![RANDOM_TOKEN_PROB; n]);
    let random_words: Vec<i64> = (0..n)
        .map(|_| rng.gen_range(0..config.vocab_size as i64))
        .collect();

    // ── Step 6: apply replacements ───────────────────────────────────────────
    let mut input_ids = ids.to_vec();
    for i in 0..n {
        if !mlm_mask[i] {
            continue;
        }
        if mask_coin[i] {
            input_ids[i] = config.mask_token_id;
        } else if random_coin[i] {
            input_ids[i] = random_words[i];
        }
    }

    // ── Step 7: untouched = !mlm_mask ────────────────────────────────────────
    let untouched = mlm_mask.iter().map(|&m| !m).collect();

    Ok(MaskedIds { input_ids, labels, untouched })
}

// ─── Tensor adapter ───────────────────────────────────────────────────────────
/// A masked batch living on the same device as the input.
#[derive(Debug, Clone)]
pub struct MaskedBatch<B: Backend> {
    /// [batch, seq_len] corrupted ids
    pub input_ids: Tensor<B, 2, Int>,
    /// [batch, seq_len] original id or ignore sentinel
    pub labels:    Tensor<B, 2, Int>,
    /// [batch, seq_len] true where nothing was selected
    pub untouched: Tensor<B, 2, Bool>,
}

/// Copy an integer tensor to the host as i64 regardless of the
/// backend's native int element type.
pub fn int_tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| ElectraError::TensorRead(format!("{e:?}")))
}

/// Mask a [batch, seq_len] tensor. The input is consumed; a fresh
/// tensor is returned so the caller's clean batch is never mutated.
pub fn mask_tokens<B: Backend, R: Rng + ?Sized>(
    inputs: Tensor<B, 2, Int>,
    config: &MaskingConfig,
    rng:    &mut R,
) -> Result<MaskedBatch<B>> {
    let [batch_size, seq_len] = inputs.dims();
    if batch_size == 0 || seq_len == 0 {
        return Err(ElectraError::EmptyBatch([batch_size, seq_len]));
    }
    let device = inputs.device();
    let ids    = int_tensor_to_vec(inputs)?;
    let masked = mask_token_ids(&ids, config, rng)?;
    tracing::trace!("Masked {} of {} positions", masked.num_masked(), ids.len());

    let shape = [batch_size, seq_len];
    Ok(MaskedBatch {
        input_ids: Tensor::from_data(TensorData::new(masked.input_ids, shape), &device),
        labels:    Tensor::from_data(TensorData::new(masked.labels, shape), &device),
        untouched: Tensor::from_data(TensorData::new(masked.untouched, shape), &device),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray;

    const PAD:  i64 = 0;
    const CLS:  i64 = 101;
    const SEP:  i64 = 102;
    const MASK: i64 = 103;
    const VOCAB: usize = 30522;

    fn config(p: f64) -> MaskingConfig {
        MaskingConfig::new(MASK, vec![PAD, 100, CLS, SEP, MASK], VOCAB)
            .with_mlm_probability(p)
    }

    /// A long row of ordinary tokens framed by [CLS] ... [SEP] [PAD] [PAD]
    fn long_row(len: usize) -> Vec<i64> {
        let mut row = vec![CLS];
        row.extend((0..len).map(|i| 1000 + (i as i64 % 20000)));
        row.extend([SEP, PAD, PAD]);
        row
    }

    #[test]
    fn test_special_tokens_never_masked() {
        let ids = long_row(500);
        let mut rng = StdRng::seed_from_u64(7);
        for p in [0.15, 0.5, 1.0] {
            let out = mask_token_ids(&ids, &config(p), &mut rng).unwrap();
            for (i, &id) in ids.iter().enumerate() {
                if [PAD, CLS, SEP].contains(&id) {
                    assert!(out.untouched[i], "special token at {i} was masked (p={p})");
                    assert_eq!(out.input_ids[i], id);
                }
            }
        }
    }

    #[test]
    fn test_labels_pair_with_mask_decision() {
        let ids = long_row(300);
        let mut rng = StdRng::seed_from_u64(11);
        let out = mask_token_ids(&ids, &config(0.3), &mut rng).unwrap();
        for i in 0..ids.len() {
            if out.untouched[i] {
                assert_eq!(out.labels[i], IGNORE_INDEX);
            } else {
                assert_eq!(out.labels[i], ids[i]);
            }
        }
    }

    #[test]
    fn test_seeded_masking_is_reproducible() {
        let ids = long_row(200);
        let a = mask_token_ids(&ids, &config(0.15), &mut StdRng::seed_from_u64(3)).unwrap();
        let b = mask_token_ids(&ids, &config(0.15), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_masking_is_dynamic_across_calls() {
        let ids = long_row(200);
        let mut rng = StdRng::seed_from_u64(3);
        let a = mask_token_ids(&ids, &config(0.15), &mut rng).unwrap();
        let b = mask_token_ids(&ids, &config(0.15), &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_masked_fraction_converges_to_probability() {
        let n   = 50_000;
        let ids = long_row(n);
        let mut rng = StdRng::seed_from_u64(42);
        let out = mask_token_ids(&ids, &config(0.15), &mut rng).unwrap();
        let frac = out.num_masked() as f64 / n as f64;
        assert!((frac - 0.15).abs() < 0.01, "masked fraction {frac}");
    }

    #[test]
    fn test_eighty_ten_ten_split() {
        let n   = 50_000;
        let ids = long_row(n);
        let mut rng = StdRng::seed_from_u64(5);
        let out = mask_token_ids(&ids, &config(1.0), &mut rng).unwrap();

        let (mut as_mask, mut unchanged, mut random) = (0usize, 0usize, 0usize);
        for i in 0..ids.len() {
            if out.untouched[i] {
                continue;
            }
            if out.input_ids[i] == MASK {
                as_mask += 1;
            } else if out.input_ids[i] == ids[i] {
                unchanged += 1;
            } else {
                random += 1;
            }
        }
        let total = (as_mask + unchanged + random) as f64;
        assert_eq!(total as usize, n);
        assert!((as_mask   as f64 / total - 0.8).abs() < 0.01);
        assert!((random    as f64 / total - 0.1).abs() < 0.01);
        assert!((unchanged as f64 / total - 0.1).abs() < 0.01);
    }

    #[test]
    fn test_all_special_row_masks_nothing() {
        let ids = vec![CLS, SEP, PAD, PAD];
        let mut rng = StdRng::seed_from_u64(1);
        let out = mask_token_ids(&ids, &config(1.0), &mut rng).unwrap();
        assert_eq!(out.num_masked(), 0);
        assert_eq!(out.input_ids, ids);
        assert!(out.labels.iter().all(|&l| l == IGNORE_INDEX));
    }

    #[test]
    fn test_force_mask_scenario() {
        // [[CLS, 5, 6, 7, SEP, PAD, PAD]] with p = 1
        let ids = vec![CLS, 5, 6, 7, SEP, PAD, PAD];
        let mut rng = StdRng::seed_from_u64(2024);
        let mut seen_mask = 0usize;
        let trials = 2_000;

        for _ in 0..trials {
            let out = mask_token_ids(&ids, &config(1.0), &mut rng).unwrap();
            assert_eq!(out.untouched, vec![true, false, false, false, true, true, true]);
            assert_eq!(
                out.labels,
                vec![IGNORE_INDEX, 5, 6, 7, IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX]
            );
            assert_eq!(&out.input_ids[4..], &[SEP, PAD, PAD]);
            assert_eq!(out.input_ids[0], CLS);
            for pos in 1..=3 {
                let v = out.input_ids[pos];
                assert!((0..VOCAB as i64).contains(&v));
                if v == MASK {
                    seen_mask += 1;
                }
            }
        }
        let frac = seen_mask as f64 / (trials * 3) as f64;
        assert!((frac - 0.8).abs() < 0.03, "mask-token fraction {frac}");
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let ids = vec![CLS, 5, SEP];
        let mut rng = StdRng::seed_from_u64(0);
        for p in [0.0, -0.1, 1.5, f64::NAN] {
            let err = mask_token_ids(&ids, &config(p), &mut rng).unwrap_err();
            assert!(matches!(err, ElectraError::InvalidProbability(_)));
        }
    }

    #[test]
    fn test_out_of_vocab_token_rejected() {
        let ids = vec![CLS, VOCAB as i64, SEP];
        let mut rng = StdRng::seed_from_u64(0);
        let err = mask_token_ids(&ids, &config(0.15), &mut rng).unwrap_err();
        assert_eq!(err, ElectraError::TokenOutOfVocab { id: VOCAB as i64, vocab_size: VOCAB });
    }

    #[test]
    fn test_tensor_masking_keeps_shape_and_input() {
        let device = Default::default();
        let ids    = vec![CLS, 5, 6, 7, SEP, PAD, PAD, CLS, 8, 9, 10, 11, 12, SEP];
        let input  = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(ids.clone(), [2, 7]), &device,
        );
        let mut rng = StdRng::seed_from_u64(9);
        let batch = mask_tokens(input.clone(), &config(1.0), &mut rng).unwrap();

        assert_eq!(batch.input_ids.dims(), [2, 7]);
        assert_eq!(batch.labels.dims(),    [2, 7]);
        assert_eq!(batch.untouched.dims(), [2, 7]);

        // the caller's tensor is untouched
        assert_eq!(int_tensor_to_vec(input).unwrap(), ids);

        let untouched = batch.untouched.into_data().to_vec::<bool>().unwrap();
        assert_eq!(
            untouched,
            vec![true, false, false, false, true, true, true,
                 true, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_empty_batch_rejected() {
        let device = Default::default();
        let input  = Tensor::<TestBackend, 2, Int>::zeros([0, 4], &device);
        let mut rng = StdRng::seed_from_u64(0);
        let err = mask_tokens(input, &config(0.15), &mut rng).unwrap_err();
        assert_eq!(err, ElectraError::EmptyBatch([0, 4]));
    }
}
