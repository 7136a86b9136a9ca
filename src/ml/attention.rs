// ============================================================
// Layer 5 — Attention
// ============================================================
// Scaled dot-product attention and the multi-head wrapper.
//
//   scores  = Q · Kᵀ / √d_k                 [B, H, Lq, Lk]
//   scores  = mask_fill(scores, mask, -1e9)
//   weights = softmax(scores, over keys)
//   context = weights · V                   [B, H, Lq, d_v]
//
// Masked scores become -1e9, not -inf. exp(-1e9) is 0 in f32
// and a fully masked row comes out uniform rather than NaN.
//
// All heads are computed in one batched matmul.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need §3.2

use burn::{
    nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{activation::softmax, Bool},
};

/// Score assigned to forbidden edges before the softmax.
pub const MASKED_SCORE: f32 = -1.0e9;

/// Scaled dot-product attention over `[batch, heads, L, d]` tensors.
///
/// Returns `(context [B, H, Lq, d_v], weights [B, H, Lq, Lk])`.
///
/// # Panics
/// Panics when q/k/v/mask shapes are inconsistent.
pub fn scaled_dot_product_attention<B: Backend>(
    q:    Tensor<B, 4>,
    k:    Tensor<B, 4>,
    v:    Tensor<B, 4>,
    mask: Tensor<B, 4, Bool>,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let [batch, heads, len_q, d_k] = q.dims();
    let [kb, kh, len_k, kd] = k.dims();
    let [vb, vh, len_v, _d_v] = v.dims();

    assert_eq!([kb, kh, kd], [batch, heads, d_k], "query/key shape mismatch");
    assert_eq!([vb, vh, len_v], [batch, heads, len_k], "key/value shape mismatch");
    assert_eq!(
        mask.dims(),
        [batch, heads, len_q, len_k],
        "mask must be [batch, heads, len_q, len_k]"
    );

    let scores = q
        .matmul(k.swap_dims(2, 3))
        .div_scalar((d_k as f32).sqrt())
        .mask_fill(mask, MASKED_SCORE);

    let weights = softmax(scores, 3);
    let context = weights.clone().matmul(v);

    (context, weights)
}

// ─── MultiHeadAttention ───────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct MultiHeadAttentionConfig {
    pub d_model: usize,
    pub n_heads: usize,
    pub d_k:     usize,
    pub d_v:     usize,
}

impl MultiHeadAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        let proj = |d_in: usize, d_out: usize| -> Linear<B> {
            LinearConfig::new(d_in, d_out).with_bias(false).init(device)
        };
        MultiHeadAttention {
            w_q:        proj(self.d_model, self.n_heads * self.d_k),
            w_k:        proj(self.d_model, self.n_heads * self.d_k),
            w_v:        proj(self.d_model, self.n_heads * self.d_v),
            fc:         proj(self.n_heads * self.d_v, self.d_model),
            layer_norm: LayerNormConfig::new(self.d_model).init(device),
            n_heads:    self.n_heads,
            d_k:        self.d_k,
            d_v:        self.d_v,
        }
    }
}

/// Multi-head attention with a post-norm residual:
/// `LayerNorm(fc(concat(heads)) + q)`.
#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    pub w_q:        Linear<B>,
    pub w_k:        Linear<B>,
    pub w_v:        Linear<B>,
    pub fc:         Linear<B>,
    pub layer_norm: LayerNorm<B>,
    pub n_heads:    usize,
    pub d_k:        usize,
    pub d_v:        usize,
}

impl<B: Backend> MultiHeadAttention<B> {
    /// q/k/v: `[batch, L, d_model]`, mask: `[batch, Lq, Lk]`.
    ///
    /// Returns the normalised output `[batch, Lq, d_model]` and the
    /// attention weights `[batch, n_heads, Lq, Lk]`.
    pub fn forward(
        &self,
        q:    Tensor<B, 3>,
        k:    Tensor<B, 3>,
        v:    Tensor<B, 3>,
        mask: Tensor<B, 3, Bool>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch, len_q, _] = q.dims();
        let [_, len_k, _] = k.dims();
        assert_eq!(mask.dims(), [batch, len_q, len_k], "mask must be [batch, len_q, len_k]");

        let residual = q.clone();

        let q = self.split_heads(self.w_q.forward(q), self.d_k);
        let k = self.split_heads(self.w_k.forward(k), self.d_k);
        let v = self.split_heads(self.w_v.forward(v), self.d_v);

        // Same mask for every head
        let mask = mask
            .unsqueeze_dim::<4>(1)
            .expand([batch, self.n_heads, len_q, len_k]);

        let (context, weights) = scaled_dot_product_attention(q, k, v, mask);

        // [B, H, Lq, d_v] → [B, Lq, H * d_v]
        let context = context
            .swap_dims(1, 2)
            .reshape([batch, len_q, self.n_heads * self.d_v]);

        let output = self.fc.forward(context);
        (self.layer_norm.forward(output + residual), weights)
    }

    /// `[B, L, H * d]` → `[B, H, L, d]`
    fn split_heads(&self, x: Tensor<B, 3>, head_dim: usize) -> Tensor<B, 4> {
        let [batch, len, _] = x.dims();
        x.reshape([batch, len, self.n_heads, head_dim]).swap_dims(1, 2)
    }
}
