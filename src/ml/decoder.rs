// ============================================================
// Layer 5 — Decoder Stack
// ============================================================
// token ids [B, L]
//     │  token embedding + positional encoding
//     ▼
// hidden [B, L, d_model] ──► DecoderLayer × n_layers ──► hidden
//                               │
//                               └─ attention weights, one tensor
//                                  [B, H, L, L] per layer
//
// Every layer keeps the [B, L, d_model] shape so layers stack
// to any depth.

use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::Bool,
};

use crate::domain::error::{GptError, GptResult};
use crate::ml::attention::{MultiHeadAttention, MultiHeadAttentionConfig};
use crate::ml::feed_forward::{PositionwiseFeedForward, PositionwiseFeedForwardConfig};
use crate::ml::mask::build_attention_mask;

// ─── PositionalEncoding ───────────────────────────────────────────────────────
/// Learned absolute positions: position `p` looks up row `p` of a
/// `[max_pos, d_model]` table. The same vector is used for every
/// sequence in the batch.
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    pub pos_embedding: Embedding<B>,
    pub max_pos:       usize,
}

impl<B: Backend> PositionalEncoding<B> {
    pub fn new(d_model: usize, max_pos: usize, device: &B::Device) -> Self {
        Self {
            pos_embedding: EmbeddingConfig::new(max_pos, d_model).init(device),
            max_pos,
        }
    }

    /// `[batch, L]` ids → `[batch, L, d_model]` positional vectors.
    ///
    /// # Panics
    /// Panics if `L > max_pos`; the decoder checks this first and
    /// returns a configuration error instead.
    pub fn forward(&self, input_ids: &Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        assert!(
            seq_len <= self.max_pos,
            "sequence length {seq_len} exceeds positional table size {}",
            self.max_pos
        );

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &input_ids.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        self.pos_embedding.forward(positions)
    }
}

// ─── DecoderLayer ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub attention: MultiHeadAttention<B>,
    pub pos_ffn:   PositionwiseFeedForward<B>,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn new(
        attention: &MultiHeadAttentionConfig,
        ffn:       &PositionwiseFeedForwardConfig,
        device:    &B::Device,
    ) -> Self {
        Self {
            attention: attention.init(device),
            pos_ffn:   ffn.init(device),
        }
    }

    /// Masked self-attention (q = k = v = x) followed by the
    /// feed-forward sublayer.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (x, attn) = self.attention.forward(x.clone(), x.clone(), x, mask);
        (self.pos_ffn.forward(x), attn)
    }
}

// ─── Decoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub embedding:    Embedding<B>,
    pub pos_encoding: PositionalEncoding<B>,
    pub layers:       Vec<DecoderLayer<B>>,
}

/// Final hidden states plus one attention tensor per layer, in order.
pub struct DecoderOutput<B: Backend> {
    pub hidden:     Tensor<B, 3>,
    pub attentions: Vec<Tensor<B, 4>>,
}

impl<B: Backend> Decoder<B> {
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Option<Tensor<B, 2, Int>>,
    ) -> GptResult<DecoderOutput<B>> {
        let [_, seq_len] = input_ids.dims();
        if seq_len > self.pos_encoding.max_pos {
            return Err(GptError::config(format!(
                "sequence length {seq_len} exceeds max_pos {}",
                self.pos_encoding.max_pos
            )));
        }

        let mask = build_attention_mask(&input_ids, attention_mask);
        let pos  = self.pos_encoding.forward(&input_ids);
        let mut hidden = self.embedding.forward(input_ids) + pos;

        let mut attentions = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (next, attn) = layer.forward(hidden, mask.clone());
            hidden = next;
            attentions.push(attn);
        }

        Ok(DecoderOutput { hidden, attentions })
    }
}
