// ============================================================
// Layer 5 — Attention Mask Construction
// ============================================================
// Masks are boolean tensors where `true` marks a FORBIDDEN
// attention edge (query i may not look at key j). They are
// consumed by mask_fill before the softmax.
//
//   causal  [B, L, L]  true where j > i   (no peeking ahead)
//   padding [B, L, L]  true where token j is <pad>, every row
//   merged  [B, L, L]  causal OR padding
//
// Example, L = 5, attention_mask = [1, 1, 1, 0, 0]:
//
//         causal          padding          merged
//   i=0   0 1 1 1 1       0 0 0 1 1        0 1 1 1 1
//   i=1   0 0 1 1 1       0 0 0 1 1        0 0 1 1 1
//   i=2   0 0 0 1 1       0 0 0 1 1        0 0 0 1 1
//   i=3   0 0 0 0 1       0 0 0 1 1        0 0 0 1 1
//   i=4   0 0 0 0 0       0 0 0 1 1        0 0 0 1 1
//
// The diagonal is always open for a real token, so its row
// always has at least one allowed key.

use burn::{prelude::*, tensor::Bool};

/// Causal mask broadcast to `[batch_size, seq_len, seq_len]`.
pub fn causal_mask<B: Backend>(
    batch_size: usize,
    seq_len:    usize,
    device:     &B::Device,
) -> Tensor<B, 3, Bool> {
    // tril_mask is false on and below the diagonal, true above it
    Tensor::<B, 2, Bool>::tril_mask([seq_len, seq_len], 0, device)
        .unsqueeze::<3>()
        .expand([batch_size, seq_len, seq_len])
}

/// Padding mask from a `[batch, L]` 0/1 attention mask: column j is
/// `true` in every row when token j is padding.
pub fn padding_mask<B: Backend>(attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3, Bool> {
    let [batch_size, seq_len] = attention_mask.dims();
    attention_mask
        .equal_elem(0)
        .unsqueeze_dim::<3>(1)
        .expand([batch_size, seq_len, seq_len])
}

/// Logical OR of two masks of identical shape.
pub fn merge_masks<B: Backend>(a: Tensor<B, 3, Bool>, b: Tensor<B, 3, Bool>) -> Tensor<B, 3, Bool> {
    assert_eq!(a.dims(), b.dims(), "cannot merge masks of different shapes");
    (a.int() + b.int()).greater_elem(0)
}

/// Self-attention mask for a batch of token ids.
///
/// Without a padding indicator the result is the causal mask alone.
///
/// # Panics
/// Panics if `attention_mask` does not have the same `[batch, L]`
/// shape as `input_ids`.
pub fn build_attention_mask<B: Backend>(
    input_ids:      &Tensor<B, 2, Int>,
    attention_mask: Option<Tensor<B, 2, Int>>,
) -> Tensor<B, 3, Bool> {
    let [batch_size, seq_len] = input_ids.dims();
    let causal = causal_mask::<B>(batch_size, seq_len, &input_ids.device());

    match attention_mask {
        Some(pad) => {
            assert_eq!(
                pad.dims(),
                [batch_size, seq_len],
                "attention mask shape must match input ids"
            );
            merge_masks(causal, padding_mask(pad))
        }
        None => causal,
    }
}
