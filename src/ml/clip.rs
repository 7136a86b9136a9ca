// ============================================================
// Layer 5 — Global Gradient Norm Clipping
// ============================================================
// All gradients are treated as one long vector g:
//
//   ‖g‖ = sqrt( Σ_params Σ_i g_i² )
//   if ‖g‖ > max_norm:  g ← g · max_norm / (‖g‖ + 1e-6)
//
// Every tensor is scaled by the same factor. Burn's
// GradientClipping::Norm works per tensor and is not used.
//
// Gradients live in GradientsParams keyed by ParamId, on the
// inner (non-autodiff) backend. A ModuleVisitor walks the model
// to enumerate every float parameter id.

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;

const CLIP_EPS: f64 = 1e-6;

struct GradNormVisitor<'a, B: AutodiffBackend> {
    grads:  &'a GradientsParams,
    sum_sq: f64,
    _b:     PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradNormVisitor<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let sq: f64 = (grad.clone() * grad).sum().into_scalar().elem();
            self.sum_sq += sq;
        }
    }
}

struct GradScaleVisitor<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    scale: f64,
    _b:    PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScaleVisitor<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
        }
    }
}

/// Global L2 norm of every gradient belonging to `module`.
pub fn grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let mut visitor = GradNormVisitor::<B> { grads, sum_sq: 0.0, _b: PhantomData };
    module.visit(&mut visitor);
    visitor.sum_sq.sqrt()
}

/// Rescale all gradients so their global norm is at most `max_norm`.
///
/// Returns the norm measured before clipping.
pub fn clip_grad_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let total = grad_norm::<B, M>(module, grads);
    let coef  = max_norm / (total + CLIP_EPS);

    if coef < 1.0 {
        let mut visitor = GradScaleVisitor::<B> { grads, scale: coef, _b: PhantomData };
        module.visit(&mut visitor);
        tracing::trace!("Clipped gradient norm {:.4} → {:.4}", total, max_norm);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{GptConfig, GptModel};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn model_and_loss(scale: f64) -> (GptModel<TestBackend>, GradientsParams) {
        let device = Default::default();
        let cfg = GptConfig {
            vocab_size: 6,
            max_pos:    8,
            d_model:    8,
            n_heads:    2,
            d_k:        4,
            d_v:        4,
            d_ff:       16,
            n_layers:   1,
        };
        let model  = cfg.init::<TestBackend>(&device).unwrap();
        let ids    = Tensor::<TestBackend, 2, Int>::from_ints([[3, 4, 5, 2]], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_ints([[4, 5, 2, 0]], &device);

        let loss  = model.forward_loss(ids, None, labels).unwrap().mul_scalar(scale);
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        (model, grads)
    }

    #[test]
    fn test_large_gradients_are_clipped_to_max_norm() {
        let (model, mut grads) = model_and_loss(1.0e4);
        let before = grad_norm::<TestBackend, _>(&model, &grads);
        assert!(before > 1.0, "expected a large gradient, got {before}");

        let reported = clip_grad_norm::<TestBackend, _>(&model, &mut grads, 1.0);
        assert!((reported - before).abs() < 1e-6 * before.max(1.0));

        let after = grad_norm::<TestBackend, _>(&model, &grads);
        assert!(after <= 1.0 + 1e-4, "norm after clipping: {after}");
        assert!(after > 0.99, "clipping should land on the threshold, got {after}");
    }

    #[test]
    fn test_small_gradients_are_untouched() {
        let (model, mut grads) = model_and_loss(1.0e-6);
        let before = grad_norm::<TestBackend, _>(&model, &grads);
        assert!(before < 1.0);

        clip_grad_norm::<TestBackend, _>(&model, &mut grads, 1.0);
        let after = grad_norm::<TestBackend, _>(&model, &grads);
        assert!((after - before).abs() < 1e-9);
    }
}
