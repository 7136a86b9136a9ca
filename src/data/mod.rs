// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a JSONL file on disk to tensor batches:
//
//   train.json / val.json
//       │
//       ▼
//   JsonlLoader       → one QaPair per non-blank line
//       │
//       ▼
//   QaDataset         → Burn Dataset; encodes + shifts on get()
//       │
//       ▼
//   QaBatcher         → stacks samples into [batch, L] tensors
//       │
//       ▼
//   DataLoader        → worker threads feeding the training loop
//
// splitter.rs and stats.rs serve the `split` and `stats`
// commands that prepare a dataset before training.

/// Reads JSON-lines question/answer files
pub mod loader;

/// Burn Dataset of shifted next-token samples
pub mod dataset;

/// Burn Batcher producing tensor batches
pub mod batcher;

/// Seeded shuffle + train/validation split
pub mod splitter;

/// Encoded length histogram
pub mod stats;
