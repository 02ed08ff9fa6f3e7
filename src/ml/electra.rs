// ============================================================
// Layer 5 — Replaced-Token Detection
// ============================================================
// Couples the generator and the discriminator:
//
//   masked ids ──► generator ──► logits [B, L, V]
//                                   │ argmax
//                                   ▼
//   generated = untouched ? masked id : prediction
//                                   │
//                                   ▼
//                             discriminator ──► logits [B, L]
//
//   is_replaced = generated != masked ids
//   non_pad     = masked ids != [PAD]
//
// The discriminator never sees [MASK] at the masked positions,
// only the generator's best guesses. No stop-gradient is put
// between the generator output and the discriminator input.
//
// Reference: Clark et al. (2020) ELECTRA §2

use burn::prelude::*;

use crate::domain::error::{self, ElectraError};
use crate::ml::loss::{ElectraLoss, ElectraLossOutput};
use crate::ml::mlm_hook::StepInputs;
use crate::ml::model::{ElectraDiscriminator, ElectraGenerator, EncoderConfig};

// ─── Model seams ──────────────────────────────────────────────────────────────
/// Any sequence model mapping ids [B, L] to vocabulary logits [B, L, V].
pub trait TokenGenerator<B: Backend> {
    fn generator_logits(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3>;
}

/// Any sequence model mapping ids [B, L] to one logit per token [B, L].
pub trait TokenDiscriminator<B: Backend> {
    fn discriminator_logits(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 2>;
}

/// Everything the composite loss needs from one forward pass.
#[derive(Debug, Clone)]
pub struct ElectraOutput<B: Backend> {
    /// [batch, seq_len, vocab]
    pub generator_logits:     Tensor<B, 3>,
    /// [batch, seq_len]
    pub discriminator_logits: Tensor<B, 2>,
    /// [batch, seq_len] discriminator target
    pub is_replaced:          Tensor<B, 2, Bool>,
    /// [batch, seq_len] true on real tokens
    pub non_pad:              Tensor<B, 2, Bool>,
    /// [batch, seq_len] the sequence the discriminator saw
    pub generated:            Tensor<B, 2, Int>,
}

/// Run the generator, substitute its predictions at the masked
/// positions and run the discriminator on the result.
pub fn replaced_token_detection<B, G, D>(
    generator:        &G,
    discriminator:    &D,
    pad_token_id:     usize,
    masked_input_ids: Tensor<B, 2, Int>,
    untouched:        Tensor<B, 2, Bool>,
) -> error::Result<ElectraOutput<B>>
where
    B: Backend,
    G: TokenGenerator<B> + ?Sized,
    D: TokenDiscriminator<B> + ?Sized,
{
    let [batch_size, seq_len] = masked_input_ids.dims();
    if untouched.dims() != [batch_size, seq_len] {
        return Err(ElectraError::shape("untouched mask", &[batch_size, seq_len], &untouched.dims()));
    }

    let non_pad = masked_input_ids.clone().not_equal_elem(pad_token_id as i64);

    let generator_logits = generator.generator_logits(masked_input_ids.clone());
    let [gen_b, gen_l, vocab] = generator_logits.dims();
    if [gen_b, gen_l] != [batch_size, seq_len] {
        return Err(ElectraError::shape(
            "generator logits",
            &[batch_size, seq_len, vocab],
            &[gen_b, gen_l, vocab],
        ));
    }

    // argmax keeps the reduced dim: [B, L, 1] → [B, L]
    let predicted = generator_logits.clone().argmax(2).reshape([batch_size, seq_len]);
    let generated = masked_input_ids.clone().mask_where(untouched.bool_not(), predicted);
    let is_replaced = generated.clone().not_equal(masked_input_ids);

    let discriminator_logits = discriminator.discriminator_logits(generated.clone());
    if discriminator_logits.dims() != [batch_size, seq_len] {
        return Err(ElectraError::shape(
            "discriminator logits",
            &[batch_size, seq_len],
            &discriminator_logits.dims(),
        ));
    }

    Ok(ElectraOutput { generator_logits, discriminator_logits, is_replaced, non_pad, generated })
}

// ─── ElectraModel ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ElectraModelConfig {
    pub generator:     EncoderConfig,
    pub discriminator: EncoderConfig,
    pub pad_token_id:  usize,
}

impl ElectraModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ElectraModel<B> {
        ElectraModel {
            generator:     self.generator.init_generator(device),
            discriminator: self.discriminator.init_discriminator(device),
            pad_token_id:  self.pad_token_id,
        }
    }
}

#[derive(Module, Debug)]
pub struct ElectraModel<B: Backend> {
    pub generator:     ElectraGenerator<B>,
    pub discriminator: ElectraDiscriminator<B>,
    pub pad_token_id:  usize,
}

impl<B: Backend> ElectraModel<B> {
    /// masked_input_ids, untouched: [batch, seq_len]
    pub fn forward(
        &self,
        masked_input_ids: Tensor<B, 2, Int>,
        untouched:        Tensor<B, 2, Bool>,
    ) -> error::Result<ElectraOutput<B>> {
        replaced_token_detection(
            &self.generator,
            &self.discriminator,
            self.pad_token_id,
            masked_input_ids,
            untouched,
        )
    }

    /// Forward pass on the hook's step inputs followed by the composite loss.
    pub fn forward_loss(
        &self,
        inputs: StepInputs<B>,
        labels: Tensor<B, 2, Int>,
        loss:   &ElectraLoss,
    ) -> error::Result<(ElectraLossOutput<B>, ElectraOutput<B>)> {
        let untouched = inputs.untouched.ok_or(ElectraError::MissingIgnoreMask)?;
        let output = self.forward(inputs.input_ids, untouched)?;
        let losses = loss.forward(&output, labels)?;
        Ok((losses, output))
    }
}
