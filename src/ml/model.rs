use burn::{
    nn::{EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::error::{GptError, GptResult};
use crate::ml::attention::MultiHeadAttentionConfig;
use crate::ml::decoder::{Decoder, DecoderLayer, PositionalEncoding};
use crate::ml::feed_forward::PositionwiseFeedForwardConfig;
use crate::infra::tokenizer_store::PAD_ID;
use crate::ml::loss::next_token_loss;

// #[derive(Config)] also provides Clone + serde impls; deriving them
// again conflicts.
#[derive(Config, Debug)]
pub struct GptConfig {
    pub vocab_size: usize,
    pub max_pos:    usize,
    pub d_model:    usize,
    pub n_heads:    usize,
    pub d_k:        usize,
    pub d_v:        usize,
    pub d_ff:       usize,
    pub n_layers:   usize,
}

impl GptConfig {
    /// Reject inconsistent hyperparameters before anything is allocated.
    pub fn validate(&self) -> GptResult<()> {
        let sizes = [
            ("vocab_size", self.vocab_size),
            ("max_pos", self.max_pos),
            ("d_model", self.d_model),
            ("n_heads", self.n_heads),
            ("d_k", self.d_k),
            ("d_v", self.d_v),
            ("d_ff", self.d_ff),
            ("n_layers", self.n_layers),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(GptError::config(format!("{name} must be positive")));
        }
        if self.n_heads * self.d_k != self.d_model {
            return Err(GptError::config(format!(
                "d_model ({}) must equal n_heads * d_k ({} * {})",
                self.d_model, self.n_heads, self.d_k
            )));
        }
        if self.n_heads * self.d_v != self.d_model {
            return Err(GptError::config(format!(
                "d_model ({}) must equal n_heads * d_v ({} * {})",
                self.d_model, self.n_heads, self.d_v
            )));
        }
        Ok(())
    }

    /// Fail fast when a sequence of `seq_len` tokens cannot be embedded.
    pub fn check_seq_len(&self, seq_len: usize) -> GptResult<()> {
        if seq_len > self.max_pos {
            return Err(GptError::config(format!(
                "sequence length {seq_len} exceeds max_pos {}",
                self.max_pos
            )));
        }
        Ok(())
    }

    /// Number of trainable scalars `init` will allocate, computed
    /// without building the model.
    pub fn num_params(&self) -> usize {
        let (d, h) = (self.d_model, self.n_heads);
        let attention = 2 * d * h * self.d_k + 2 * d * h * self.d_v + 2 * d;
        let ffn       = 2 * d * self.d_ff + 2 * d;
        let embedding = (self.vocab_size + self.max_pos) * d;
        let head      = d * self.vocab_size + self.vocab_size;

        embedding + self.n_layers * (attention + ffn) + head
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> GptResult<GptModel<B>> {
        self.validate()?;

        let attention = MultiHeadAttentionConfig::new(self.d_model, self.n_heads, self.d_k, self.d_v);
        let ffn       = PositionwiseFeedForwardConfig::new(self.d_model, self.d_ff);

        let decoder = Decoder {
            embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            pos_encoding: PositionalEncoding::new(self.d_model, self.max_pos, device),
            layers:       (0..self.n_layers)
                .map(|_| DecoderLayer::new(&attention, &ffn, device))
                .collect(),
        };
        let projection = LinearConfig::new(self.d_model, self.vocab_size).init(device);

        let model = GptModel { decoder, projection };
        tracing::debug!(
            "GPT model built: {} layers, {} heads, d_model={}, {} parameters",
            self.n_layers,
            self.n_heads,
            self.d_model,
            model.num_params()
        );
        Ok(model)
    }
}

#[derive(Module, Debug)]
pub struct GptModel<B: Backend> {
    pub decoder:    Decoder<B>,
    pub projection: Linear<B>,
}

pub struct GptOutput<B: Backend> {
    /// `[batch * L, vocab_size]`, row `b * L + t` is position t of sequence b
    pub logits: Tensor<B, 2>,

    /// One `[batch, n_heads, L, L]` tensor per decoder layer. Kept for
    /// inspection only; training never reads them.
    pub attentions: Vec<Tensor<B, 4>>,
}

impl<B: Backend> GptModel<B> {
    /// input_ids: [batch, L], attention_mask: optional [batch, L] of 0/1
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Option<Tensor<B, 2, Int>>,
    ) -> GptResult<GptOutput<B>> {
        let out    = self.decoder.forward(input_ids, attention_mask)?;
        let logits = self.projection.forward(out.hidden); // [batch, L, vocab]
        let [batch, len, vocab] = logits.dims();

        Ok(GptOutput {
            logits:     logits.reshape([batch * len, vocab]),
            attentions: out.attentions,
        })
    }

    /// Mean next-token cross entropy over non-padding labels.
    pub fn forward_loss(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Option<Tensor<B, 2, Int>>,
        labels:         Tensor<B, 2, Int>,
    ) -> GptResult<Tensor<B, 1>> {
        let [batch, len] = labels.dims();
        let output = self.forward(input_ids, attention_mask)?;
        Ok(next_token_loss(output.logits, labels.reshape([batch * len]), PAD_ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config(vocab_size: usize) -> GptConfig {
        GptConfig {
            vocab_size,
            max_pos:  16,
            d_model:  8,
            n_heads:  2,
            d_k:      4,
            d_v:      4,
            d_ff:     16,
            n_layers: 2,
        }
    }

    fn ids(rows: &[[i32; 5]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i32> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 5])
    }

    #[test]
    fn test_rejects_head_dimension_mismatch() {
        let mut cfg = tiny_config(10);
        cfg.d_k = 3;
        let err = cfg.init::<TestBackend>(&Default::default()).unwrap_err();
        assert!(matches!(err, GptError::Configuration(_)));

        let mut cfg = tiny_config(10);
        cfg.d_v = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let mut cfg = tiny_config(10);
        cfg.n_layers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_logits_shape_is_flattened() {
        let model = tiny_config(7).init::<TestBackend>(&Default::default()).unwrap();
        let out   = model.forward(ids(&[[3, 4, 2, 0, 0], [5, 6, 2, 4, 0]]), None).unwrap();
        assert_eq!(out.logits.dims(), [2 * 5, 7]);
        assert_eq!(out.attentions.len(), 2);
        for attn in &out.attentions {
            assert_eq!(attn.dims(), [2, 2, 5, 5]);
        }
    }

    #[test]
    fn test_decoder_preserves_hidden_shape() {
        let model = tiny_config(7).init::<TestBackend>(&Default::default()).unwrap();
        let out   = model.decoder.forward(ids(&[[1, 2, 3, 4, 5]]), None).unwrap();
        assert_eq!(out.hidden.dims(), [1, 5, 8]);
    }

    #[test]
    fn test_sequence_longer_than_max_pos_is_rejected() {
        let mut cfg = tiny_config(7);
        cfg.max_pos = 4;
        let model = cfg.init::<TestBackend>(&Default::default()).unwrap();
        let err   = model.forward(ids(&[[1, 2, 3, 4, 5]]), None).err().unwrap();
        assert!(matches!(err, GptError::Configuration(_)));
        assert!(cfg.check_seq_len(5).is_err());
        assert!(cfg.check_seq_len(4).is_ok());
    }

    #[test]
    fn test_no_attention_to_future_or_padding() {
        // vocab {<pad>:0, <unk>:1, <sep>:2, a:3, b:4}, "ab<sep>" padded to 5
        let device = Default::default();
        let model  = tiny_config(5).init::<TestBackend>(&device).unwrap();
        let mask   = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1, 1, 0, 0]], &device);
        let out    = model.forward(ids(&[[3, 4, 2, 0, 0]]), Some(mask)).unwrap();

        for (layer, attn) in out.attentions.into_iter().enumerate() {
            let w: Vec<f32> = attn.into_data().to_vec().unwrap();
            for head in 0..2 {
                for i in 0..5 {
                    let row = &w[(head * 5 + i) * 5..(head * 5 + i + 1) * 5];
                    let sum: f32 = row.iter().sum();
                    assert!((sum - 1.0).abs() < 1e-5, "layer {layer} head {head} row {i}");
                    for (j, &p) in row.iter().enumerate() {
                        if j > i || (i <= 2 && j >= 3) {
                            assert!(p < 1e-6, "layer {layer} head {head}: w[{i}][{j}] = {p}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_causal_prefix_is_independent_of_suffix() {
        // Changing a later token must not change logits of earlier positions
        let model = tiny_config(9).init::<TestBackend>(&Default::default()).unwrap();
        let a = model.forward(ids(&[[3, 4, 5, 6, 7]]), None).unwrap().logits;
        let b = model.forward(ids(&[[3, 4, 5, 8, 1]]), None).unwrap().logits;

        let a: Vec<f32> = a.slice([0..3, 0..9]).into_data().to_vec().unwrap();
        let b: Vec<f32> = b.slice([0..3, 0..9]).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_param_count_matches_built_model() {
        let cfg   = tiny_config(7);
        let model = cfg.init::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(cfg.num_params(), model.num_params());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let cfg  = tiny_config(11);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: GptConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.vocab_size, 11);
        assert_eq!(back.n_layers, 2);
    }
}
