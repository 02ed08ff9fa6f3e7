use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::ml::electra::{TokenDiscriminator, TokenGenerator};

// #[derive(Config)] already provides Clone and the serde impls.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:   usize,
    pub max_seq_len:  usize,
    pub d_model:      usize,
    pub num_heads:    usize,
    pub num_layers:   usize,
    pub d_ff:         usize,
    #[config(default = 0.1)]
    pub dropout:      f64,
    #[config(default = 0)]
    pub pad_token_id: usize,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        Encoder {
            token_embedding, position_embedding, layers,
            final_norm, dropout,
            pad_token_id: self.pad_token_id,
        }
    }

    /// Generator (MLM) stack: encoder + dense/GELU/norm + vocab projection.
    pub fn init_generator<B: Backend>(&self, device: &B::Device) -> ElectraGenerator<B> {
        ElectraGenerator {
            encoder:    self.init(device),
            head_dense: LinearConfig::new(self.d_model, self.d_model).init(device),
            head_norm:  LayerNormConfig::new(self.d_model).init(device),
            decoder:    LinearConfig::new(self.d_model, self.vocab_size).init(device),
        }
    }

    /// Discriminator stack: encoder + dense/GELU + one logit per token.
    pub fn init_discriminator<B: Backend>(&self, device: &B::Device) -> ElectraDiscriminator<B> {
        ElectraDiscriminator {
            encoder:    self.init(device),
            head_dense: LinearConfig::new(self.d_model, self.d_model).init(device),
            classifier: LinearConfig::new(self.d_model, 1).init(device),
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// mask_pad: [batch, seq_len], true at padding positions
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub pad_token_id:       usize,
}

impl<B: Backend> Encoder<B> {
    /// input_ids: [batch, seq_len] → hidden states [batch, seq_len, d_model]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let mask_pad = input_ids.clone().equal_elem(self.pad_token_id as i64);

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        self.final_norm.forward(x)
    }
}

// ─── Generator ────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ElectraGenerator<B: Backend> {
    pub encoder:    Encoder<B>,
    pub head_dense: Linear<B>,
    pub head_norm:  LayerNorm<B>,
    pub decoder:    Linear<B>,
}

impl<B: Backend> TokenGenerator<B> for ElectraGenerator<B> {
    /// [batch, seq_len] → [batch, seq_len, vocab_size]
    fn generator_logits(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let hidden = self.encoder.forward(input_ids);
        let hidden = self.head_norm.forward(gelu(self.head_dense.forward(hidden)));
        self.decoder.forward(hidden)
    }
}

// ─── Discriminator ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ElectraDiscriminator<B: Backend> {
    pub encoder:    Encoder<B>,
    pub head_dense: Linear<B>,
    pub classifier: Linear<B>,
}

impl<B: Backend> TokenDiscriminator<B> for ElectraDiscriminator<B> {
    /// [batch, seq_len] → [batch, seq_len], one "was replaced" logit per token
    fn discriminator_logits(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();
        let hidden = self.encoder.forward(input_ids);
        let hidden = gelu(self.head_dense.forward(hidden));
        self.classifier.forward(hidden).reshape([batch_size, seq_len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn tiny() -> EncoderConfig {
        EncoderConfig::new(50, 16, 8, 2, 1, 16).with_dropout(0.0)
    }

    fn ids() -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(
            TensorData::new(vec![1i64, 7, 8, 9, 2, 0, 1, 10, 11, 12, 13, 2], [2, 6]),
            &Default::default(),
        )
    }

    #[test]
    fn test_encoder_output_shape() {
        let encoder = tiny().init::<TestBackend>(&Default::default());
        assert_eq!(encoder.forward(ids()).dims(), [2, 6, 8]);
    }

    #[test]
    fn test_generator_logits_cover_vocab() {
        let generator = tiny().init_generator::<TestBackend>(&Default::default());
        assert_eq!(generator.generator_logits(ids()).dims(), [2, 6, 50]);
    }

    #[test]
    fn test_discriminator_one_logit_per_token() {
        let discriminator = tiny().init_discriminator::<TestBackend>(&Default::default());
        assert_eq!(discriminator.discriminator_logits(ids()).dims(), [2, 6]);
    }
}
