// ============================================================
// Layer 5 — Position-wise Feed-Forward Sublayer
// ============================================================
// Applied to every position independently:
//
//   out = LayerNorm(x + W2 · relu(W1 · x))
//
// W1: d_model → d_ff, W2: d_ff → d_model, both without bias.
// Attention mixes information across positions; this sublayer
// transforms each position on its own.

use burn::{
    nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

#[derive(Config, Debug)]
pub struct PositionwiseFeedForwardConfig {
    pub d_model: usize,
    pub d_ff:    usize,
}

impl PositionwiseFeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PositionwiseFeedForward<B> {
        PositionwiseFeedForward {
            fc1:        LinearConfig::new(self.d_model, self.d_ff).with_bias(false).init(device),
            fc2:        LinearConfig::new(self.d_ff, self.d_model).with_bias(false).init(device),
            layer_norm: LayerNormConfig::new(self.d_model).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct PositionwiseFeedForward<B: Backend> {
    pub fc1:        Linear<B>,
    pub fc2:        Linear<B>,
    pub layer_norm: LayerNorm<B>,
}

impl<B: Backend> PositionwiseFeedForward<B> {
    /// `[batch, L, d_model]` → `[batch, L, d_model]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let out = self.fc2.forward(relu(self.fc1.forward(x.clone())));
        self.layer_norm.forward(out + x)
    }
}
