// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The model is a decoder-only
// transformer (GPT) over character ids:
//
//   ids ──► Embedding + PositionalEncoding
//            │
//            ▼
//        ┌─────────────── DecoderLayer × n_layers ──┐
//        │  masked MultiHeadAttention (+res, LN)    │
//        │  PositionwiseFeedForward   (+res, LN)    │
//        └──────────────────────────────────────────┘
//            │
//            ▼
//        Linear → logits [batch * L, vocab_size]
//
// mask.rs builds the causal + padding mask shared by every
// layer. loss.rs, clip.rs and trainer.rs turn the model into a
// training loop.

/// Causal and padding attention masks
pub mod mask;

/// Scaled dot-product and multi-head attention
pub mod attention;

/// Position-wise feed-forward sublayer
pub mod feed_forward;

/// Positional encoding, decoder layer and decoder stack
pub mod decoder;

/// GPT model: decoder + vocabulary projection
pub mod model;

/// Cross entropy that skips padding targets
pub mod loss;

/// Global gradient norm clipping
pub mod clip;

/// Training loop with validation and checkpointing
pub mod trainer;
