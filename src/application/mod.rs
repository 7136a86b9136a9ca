// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal per command. No tensor math and no printing here; only
// workflow coordination.

/// The training workflow
pub mod train_use_case;

/// Vocabulary, split, statistics and model inspection
pub mod prepare_use_case;
