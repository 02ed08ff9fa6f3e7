// ============================================================
// Layer 5 — Masked-LM Hook
// ============================================================
// Binds the masker to its configuration and to a private RNG
// stream, and sits at the start of every training step:
//
//   clean batch ──► begin_batch ──► inputs:  (masked_ids[, untouched])
//                                   targets: labels
//
// The RNG advances exactly once per call, so a seeded hook
// replays the same sequence of corruptions across runs while
// an entropy-seeded hook gives fresh masks every step.
//
// show_batch() is the human-facing path: mask one batch and
// render inputs next to labels.

use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::domain::error::Result;
use crate::domain::traits::TokenEncoder;
use crate::ml::masking::{int_tensor_to_vec, mask_tokens, MaskedBatch, MaskingConfig};

/// Model-side half of one training step
#[derive(Debug, Clone)]
pub struct StepInputs<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,
    /// Present only when the hook was built with `output_ignore_mask`
    pub untouched: Option<Tensor<B, 2, Bool>>,
}

/// What the training loop sees for one step after interception
#[derive(Debug, Clone)]
pub struct StepBatch<B: Backend> {
    pub inputs: StepInputs<B>,
    pub labels: Tensor<B, 2, Int>,
}

/// Rendering switches for `show_batch`
#[derive(Debug, Clone, Default)]
pub struct ShowBatchOptions {
    /// Display this id instead of the ignore sentinel in the label row
    pub show_ignore_id: Option<i64>,
    /// Prepend a short explanation of what the rows mean
    pub verbose: bool,
    /// Render at most this many examples
    pub max_rows: Option<usize>,
}

pub struct MaskedLmHook {
    config:             MaskingConfig,
    output_ignore_mask: bool,
    rng:                StdRng,
}

impl MaskedLmHook {
    /// Hook seeded from OS entropy: every run masks differently.
    pub fn new(config: MaskingConfig, output_ignore_mask: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, output_ignore_mask, rng: StdRng::from_entropy() })
    }

    /// Hook with a fixed seed, for reproducible runs and tests.
    pub fn with_seed(config: MaskingConfig, output_ignore_mask: bool, seed: u64) -> Result<Self> {
        let mut hook = Self::new(config, output_ignore_mask)?;
        hook.reseed(seed);
        Ok(hook)
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Replace the loop's clean batch with masked inputs and labels.
    pub fn begin_batch<B: Backend>(&mut self, input_ids: Tensor<B, 2, Int>) -> Result<StepBatch<B>> {
        let masked = self.mask(input_ids)?;
        let untouched = self.output_ignore_mask.then_some(masked.untouched);
        Ok(StepBatch {
            inputs: StepInputs { input_ids: masked.input_ids, untouched },
            labels: masked.labels,
        })
    }

    /// Standalone masking, usable without a training loop.
    pub fn mask<B: Backend>(&mut self, input_ids: Tensor<B, 2, Int>) -> Result<MaskedBatch<B>> {
        mask_tokens(input_ids, &self.config, &mut self.rng)
    }

    /// Mask one batch and render it for inspection.
    pub fn show_batch<B: Backend>(
        &mut self,
        input_ids: Tensor<B, 2, Int>,
        options:   &ShowBatchOptions,
        decoder:   Option<&dyn TokenEncoder>,
    ) -> Result<String> {
        let [batch_size, seq_len] = input_ids.dims();
        let masked = self.mask(input_ids)?;

        let inputs = int_tensor_to_vec(masked.input_ids)?;
        let mut labels = int_tensor_to_vec(masked.labels)?;
        if let Some(display) = options.show_ignore_id {
            for l in labels.iter_mut().filter(|l| **l == self.config.ignore_index) {
                *l = display;
            }
        }

        let mut out = String::new();
        if options.verbose {
            out.push_str("Loss is only computed where y is not the ignore marker.\n");
            out.push_str("1. Positions with a label in y hold [MASK], a random token, or the original token in x.\n");
            out.push_str("2. Special tokens ([CLS], [SEP], [PAD]) are never masked.\n");
            out.push_str("3. Masking is dynamic: every call gives a different result.\n\n");
        }

        let rows = options.max_rows.unwrap_or(batch_size).min(batch_size);
        for row in 0..rows {
            let span = row * seq_len..(row + 1) * seq_len;
            out.push_str(&render_row(
                row,
                &inputs[span.clone()],
                &labels[span],
                self.config.ignore_index,
                decoder,
            ));
        }
        Ok(out)
    }
}

fn token_text(id: i64, decoder: Option<&dyn TokenEncoder>) -> String {
    if id < 0 {
        return id.to_string();
    }
    decoder
        .and_then(|d| d.token_name(id as u32))
        .unwrap_or_else(|| id.to_string())
}

/// Two aligned lines per example: `x:` masked input, `y:` labels.
/// Ignored labels are shown as `-`.
fn render_row(
    row:          usize,
    inputs:       &[i64],
    labels:       &[i64],
    ignore_index: i64,
    decoder:      Option<&dyn TokenEncoder>,
) -> String {
    let mut x_line = String::from("x:");
    let mut y_line = String::from("y:");

    for (&x, &y) in inputs.iter().zip(labels) {
        let x_txt = token_text(x, decoder);
        let y_txt = if y == ignore_index { "-".to_string() } else { token_text(y, decoder) };
        let width = x_txt.chars().count().max(y_txt.chars().count());
        x_line.push_str(&format!(" {x_txt:<width$}"));
        y_line.push_str(&format!(" {y_txt:<width$}"));
    }

    format!(
        "── example {row} ──\n{}\n{}\n",
        x_line.trim_end(),
        y_line.trim_end()
    )
}
