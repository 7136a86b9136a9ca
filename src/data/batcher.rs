// ============================================================
// Layer 4 — Q&A Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks a Vec<QaSample> into
// one QaBatch of [batch_size, seq_len] integer tensors.
//
// Every sample is already padded to the same length by the
// tokenizer, so stacking is a flatten + reshape:
//   [s1_t1, ..., s1_tL, s2_t1, ..., sN_tL] → [N, L]
//
// The batcher is generic over the backend so the training loader
// produces autodiff tensors while the validation loader produces
// plain inner-backend tensors.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::QaSample;

/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct QaBatch<B: Backend> {
    /// Token ids — shape: [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Next-token targets — shape: [batch_size, seq_len]
    pub labels: Tensor<B, 2, Int>,
}

/// Holds the target device so tensors are created where the model lives.
#[derive(Clone, Debug)]
pub struct QaBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> QaBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, rows: Vec<&[u32]>, seq_len: usize) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let flat: Vec<i32> = rows
            .into_iter()
            .flat_map(|r| r.iter().map(|&x| x as i32))
            .collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<QaSample, QaBatch<B>> for QaBatcher<B> {
    fn batch(&self, items: Vec<QaSample>) -> QaBatch<B> {
        let seq_len = items[0].seq_len();

        let input_ids = self.stack(items.iter().map(|s| s.input_ids.as_slice()).collect(), seq_len);
        let attention_mask =
            self.stack(items.iter().map(|s| s.attention_mask.as_slice()).collect(), seq_len);
        let labels = self.stack(items.iter().map(|s| s.labels.as_slice()).collect(), seq_len);

        QaBatch { input_ids, attention_mask, labels }
    }
}
