// ============================================================
// Layer 5 — Composite ELECTRA Loss
// ============================================================
//   total = w_gen  * CE(generator logits, labels)      masked positions only
//         + w_disc * BCE(discriminator logits, is_replaced)  non-pad only
//
// Defaults (1.0, 50.0): the discriminator objective dominates.
//
// Position selection is done with masks and a masked mean
// instead of gathering a ragged 1-D tensor. The result is the
// same mean over the selected positions, and values at the
// excluded positions cannot leak in (they are zeroed before
// the reduction).
//
// Reference: Clark et al. (2020) ELECTRA §2, eq. (1)
//            Szegedy et al. (2016) label smoothing

use burn::{
    prelude::*,
    tensor::activation::{log_softmax, relu},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{ElectraError, Result};
use crate::ml::electra::ElectraOutput;
use crate::ml::masking::IGNORE_INDEX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectraLossConfig {
    pub generator_weight:     f64,
    pub discriminator_weight: f64,
    /// Generator-only label smoothing epsilon, e.g. 0.1
    pub label_smoothing:      Option<f64>,
    pub ignore_index:         i64,
}

impl ElectraLossConfig {
    pub fn new() -> Self {
        Self {
            generator_weight:     1.0,
            discriminator_weight: 50.0,
            label_smoothing:      None,
            ignore_index:         IGNORE_INDEX,
        }
    }

    pub fn with_weights(mut self, generator: f64, discriminator: f64) -> Self {
        self.generator_weight     = generator;
        self.discriminator_weight = discriminator;
        self
    }

    pub fn with_label_smoothing(mut self, epsilon: Option<f64>) -> Self {
        self.label_smoothing = epsilon;
        self
    }

    pub fn with_ignore_index(mut self, ignore_index: i64) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    pub fn init(&self) -> Result<ElectraLoss> {
        for (name, w) in [("generator", self.generator_weight), ("discriminator", self.discriminator_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(ElectraError::InvalidLoss(format!("{name} weight must be finite and >= 0, got {w}")));
            }
        }
        if let Some(eps) = self.label_smoothing {
            if !(0.0..1.0).contains(&eps) {
                return Err(ElectraError::InvalidLoss(format!("label smoothing must be in [0, 1), got {eps}")));
            }
        }
        Ok(ElectraLoss { config: self.clone() })
    }
}

impl Default for ElectraLossConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The three scalars of one step, each of shape [1]
#[derive(Debug, Clone)]
pub struct ElectraLossOutput<B: Backend> {
    pub total:         Tensor<B, 1>,
    pub generator:     Tensor<B, 1>,
    pub discriminator: Tensor<B, 1>,
}

#[derive(Debug, Clone)]
pub struct ElectraLoss {
    config: ElectraLossConfig,
}

impl ElectraLoss {
    pub fn forward<B: Backend>(
        &self,
        output: &ElectraOutput<B>,
        labels: Tensor<B, 2, Int>,
    ) -> Result<ElectraLossOutput<B>> {
        let [batch_size, seq_len, _] = output.generator_logits.dims();
        let expected = [batch_size, seq_len];
        if labels.dims() != expected {
            return Err(ElectraError::shape("labels", &expected, &labels.dims()));
        }
        if output.discriminator_logits.dims() != expected {
            return Err(ElectraError::shape("discriminator logits", &expected, &output.discriminator_logits.dims()));
        }
        if output.is_replaced.dims() != expected || output.non_pad.dims() != expected {
            return Err(ElectraError::shape("replacement / non-pad masks", &expected, &output.is_replaced.dims()));
        }
        if output.generated.dims() != expected {
            return Err(ElectraError::shape("generated ids", &expected, &output.generated.dims()));
        }

        let generator = generator_loss(
            output.generator_logits.clone(),
            labels,
            self.config.ignore_index,
            self.config.label_smoothing,
        );
        let discriminator = discriminator_loss(
            output.discriminator_logits.clone(),
            output.is_replaced.clone().float(),
            output.non_pad.clone(),
        );
        let total = generator.clone().mul_scalar(self.config.generator_weight)
            + discriminator.clone().mul_scalar(self.config.discriminator_weight);

        Ok(ElectraLossOutput { total, generator, discriminator })
    }
}

/// Token-classification loss averaged over positions whose label
/// is not `ignore_index`. With smoothing `eps`, each position costs
/// `(1 - eps) * nll + eps * mean_v(-log p_v)`.
///
/// logits: [batch, seq_len, vocab], labels: [batch, seq_len]
pub fn generator_loss<B: Backend>(
    logits:          Tensor<B, 3>,
    labels:          Tensor<B, 2, Int>,
    ignore_index:    i64,
    label_smoothing: Option<f64>,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab] = logits.dims();
    let n = batch_size * seq_len;

    let logits = logits.reshape([n, vocab]);
    let labels = labels.reshape([n]);

    let ignored = labels.clone().equal_elem(ignore_index);
    // gather needs a valid index everywhere; ignored rows are zeroed below
    let targets = labels.mask_fill(ignored.clone(), 0);

    let log_probs = log_softmax(logits, 1);
    let nll = log_probs
        .clone()
        .gather(1, targets.unsqueeze_dim::<2>(1))
        .reshape([n])
        .neg();

    let per_token = match label_smoothing {
        Some(eps) if eps > 0.0 => {
            let uniform = log_probs.sum_dim(1).reshape([n]).neg().div_scalar(vocab as f64);
            nll.mul_scalar(1.0 - eps) + uniform.mul_scalar(eps)
        }
        _ => nll,
    };

    masked_mean(per_token, ignored.bool_not())
}

/// Binary cross-entropy with logits averaged over non-pad positions.
///
/// Uses the stable form `max(x, 0) - x*z + log(1 + exp(-|x|))`.
/// logits, targets, non_pad: [batch, seq_len]
pub fn discriminator_loss<B: Backend>(
    logits:  Tensor<B, 2>,
    targets: Tensor<B, 2>,
    non_pad: Tensor<B, 2, Bool>,
) -> Tensor<B, 1> {
    let [batch_size, seq_len] = logits.dims();
    let n = batch_size * seq_len;

    let x = logits.reshape([n]);
    let z = targets.reshape([n]);
    let keep = non_pad.reshape([n]);

    // pad logits never enter the arithmetic, even if they are inf
    let x = x.mask_fill(keep.clone().bool_not(), 0.0);
    let per_token = relu(x.clone()) - x.clone() * z + x.abs().neg().exp().log1p();

    masked_mean(per_token, keep)
}

/// Mean of `values` over the positions where `keep` is true.
/// An empty selection yields 0 rather than NaN.
fn masked_mean<B: Backend>(values: Tensor<B, 1>, keep: Tensor<B, 1, Bool>) -> Tensor<B, 1> {
    let count = keep.clone().float().sum().clamp_min(1.0);
    values.mask_fill(keep.bool_not(), 0.0).sum() / count
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    fn float2(values: Vec<f32>, shape: [usize; 2]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn bool2(values: Vec<bool>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Bool> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn int2(values: Vec<i64>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn output(disc_logits: Vec<f32>) -> ElectraOutput<TestBackend> {
        let device = Default::default();
        ElectraOutput {
            generator_logits: Tensor::zeros([1, 5, 4], &device),
            discriminator_logits: float2(disc_logits, [1, 5]),
            is_replaced: bool2(vec![false, true, false, false, false], [1, 5]),
            non_pad:     bool2(vec![true, true, true, false, false], [1, 5]),
            generated:   int2(vec![1, 3, 2, 0, 0], [1, 5]),
        }
    }

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        // zero logits over 4 classes → CE = ln 4 at every kept position
        let logits = Tensor::<TestBackend, 3>::zeros([1, 3, 4], &Default::default());
        let labels = int2(vec![-100, 2, 3], [1, 3]);
        let loss = scalar(generator_loss(logits, labels, -100, None));
        assert_relative_eq!(loss, 4f64.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_ignored_positions_do_not_count() {
        // position 0 has a terrible prediction but is ignored
        let mut data = vec![0.0f32; 2 * 3];
        data[0] = -50.0; // row 0, class 0
        data[3 + 1] = 10.0; // row 1, class 1
        let logits = Tensor::<TestBackend, 3>::from_data(TensorData::new(data, [1, 2, 3]), &Default::default());
        let labels = int2(vec![-100, 1], [1, 2]);
        let loss = scalar(generator_loss(logits, labels, -100, None));
        assert!(loss < 1e-3, "loss {loss}");
    }

    #[test]
    fn test_label_smoothing_matches_formula() {
        let data = vec![2.0f32, 0.0, 0.0];
        let logits = Tensor::<TestBackend, 3>::from_data(TensorData::new(data.clone(), [1, 1, 3]), &Default::default());
        let labels = int2(vec![0], [1, 1]);

        let z: f64 = data.iter().map(|&v| (v as f64).exp()).sum();
        let log_p: Vec<f64> = data.iter().map(|&v| v as f64 - z.ln()).collect();
        let eps = 0.1;
        let expected = (1.0 - eps) * -log_p[0] + eps * -log_p.iter().sum::<f64>() / 3.0;

        let loss = scalar(generator_loss(logits, labels, -100, Some(eps)));
        assert_relative_eq!(loss, expected, epsilon = 1e-5);
    }

    #[test]
    fn test_no_masked_positions_gives_zero() {
        let logits = Tensor::<TestBackend, 3>::zeros([1, 2, 4], &Default::default());
        let labels = int2(vec![-100, -100], [1, 2]);
        assert_eq!(scalar(generator_loss(logits, labels, -100, None)), 0.0);
    }

    #[test]
    fn test_bce_matches_reference_values() {
        // logits 0 → ln 2 for either target
        let loss = discriminator_loss(
            float2(vec![0.0, 0.0], [1, 2]),
            float2(vec![1.0, 0.0], [1, 2]),
            bool2(vec![true, true], [1, 2]),
        );
        assert_relative_eq!(scalar(loss), 2f64.ln(), epsilon = 1e-6);

        // large confident correct logits → ~0, stays finite
        let loss = discriminator_loss(
            float2(vec![80.0, -80.0], [1, 2]),
            float2(vec![1.0, 0.0], [1, 2]),
            bool2(vec![true, true], [1, 2]),
        );
        let v = scalar(loss);
        assert!(v.is_finite() && v < 1e-6);
    }

    #[test]
    fn test_discriminator_loss_ignores_padding_logits() {
        let loss = ElectraLossConfig::new().init().unwrap();
        let labels = || int2(vec![-100, 3, -100, -100, -100], [1, 5]);

        let a = loss.forward(&output(vec![0.3, -1.2, 2.0, 0.0, 0.0]), labels()).unwrap();
        let b = loss.forward(&output(vec![0.3, -1.2, 2.0, 1e6, -1e6]), labels()).unwrap();
        let c = loss.forward(&output(vec![0.3, -1.2, 2.0, f32::INFINITY, f32::NAN]), labels()).unwrap();

        let da = scalar(a.discriminator);
        assert_relative_eq!(da, scalar(b.discriminator), epsilon = 1e-9);
        assert_relative_eq!(da, scalar(c.discriminator), epsilon = 1e-9);
        assert_relative_eq!(scalar(a.total), scalar(c.total), epsilon = 1e-9);
    }

    #[test]
    fn test_total_is_weighted_sum() {
        let loss = ElectraLossConfig::new().with_weights(2.0, 50.0).init().unwrap();
        let out = loss
            .forward(&output(vec![0.5, 0.5, -0.5, 0.0, 0.0]), int2(vec![-100, 3, -100, -100, -100], [1, 5]))
            .unwrap();
        let expected = 2.0 * scalar(out.generator.clone()) + 50.0 * scalar(out.discriminator.clone());
        assert_relative_eq!(scalar(out.total), expected, epsilon = 1e-4);
    }

    #[test]
    fn test_label_shape_mismatch() {
        let loss = ElectraLossConfig::new().init().unwrap();
        let err = loss.forward(&output(vec![0.0; 5]), int2(vec![-100; 4], [1, 4])).unwrap_err();
        assert_eq!(err, ElectraError::shape("labels", &[1, 5], &[1, 4]));
    }

    #[test]
    fn test_generated_shape_mismatch() {
        let loss = ElectraLossConfig::new().init().unwrap();
        let mut out = output(vec![0.0; 5]);
        out.generated = int2(vec![1, 3, 2, 0], [1, 4]);
        let err = loss.forward(&out, int2(vec![-100; 5], [1, 5])).unwrap_err();
        assert_eq!(err, ElectraError::shape("generated ids", &[1, 5], &[1, 4]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ElectraLossConfig::new().with_weights(f64::NAN, 1.0).init().is_err());
        assert!(ElectraLossConfig::new().with_label_smoothing(Some(1.0)).init().is_err());
    }
}
