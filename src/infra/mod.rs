// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the other
// layers:
//
//   tokenizer_store.rs — character tokenizer and the vocabulary
//                        JSON file it is loaded from / saved to
//
//   checkpoint.rs      — best/last model weights plus the
//                        model_config.json needed to rebuild
//                        the architecture before loading them
//
//   metrics.rs         — CSV scalar sink for Loss/train and
//                        Loss/val, and the per-epoch summary

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Character tokenizer and vocabulary persistence
pub mod tokenizer_store;

/// Training scalar CSV logger
pub mod metrics;
