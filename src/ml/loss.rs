// ============================================================
// Layer 5 — Next-Token Loss
// ============================================================
// Token-level cross entropy with an ignored label id:
//
//   loss = - Σ_{t : y_t ≠ ignore} log softmax(z_t)[y_t]
//          ─────────────────────────────────────────────
//                 #{t : y_t ≠ ignore}
//
// The mean runs over kept tokens only: padding adds nothing to
// the numerator and is not counted in the denominator.

use burn::{prelude::*, tensor::activation::log_softmax};

/// logits: `[N, vocab]`, targets: `[N]`. Returns a one-element tensor.
///
/// When every target is ignored the loss is 0.
///
/// # Panics
/// Panics if the number of targets differs from the number of rows.
pub fn next_token_loss<B: Backend>(
    logits:       Tensor<B, 2>,
    targets:      Tensor<B, 1, Int>,
    ignore_index: u32,
) -> Tensor<B, 1> {
    let [rows, _vocab] = logits.dims();
    assert_eq!(targets.dims(), [rows], "one target per logits row");

    let log_probs = log_softmax(logits, 1);
    let picked = log_probs
        .gather(1, targets.clone().reshape([rows, 1]))
        .reshape([rows]);

    let keep  = targets.equal_elem(ignore_index as i32).bool_not().float();
    let count = keep.clone().sum().clamp_min(1.0);

    (picked * keep).sum().neg() / count
}
