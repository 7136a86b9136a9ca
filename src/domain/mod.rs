// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that describe what the
// system works with. Nothing in here touches Burn tensors or
// the filesystem.
//
//   qa_pair.rs — one question/answer record from the dataset
//   error.rs   — the typed error taxonomy (config, data, vocab)
//   traits.rs  — seams other layers implement (record source,
//                scalar metric sink)

/// A question/answer record as read from a JSONL line
pub mod qa_pair;

/// Typed errors shared by every layer
pub mod error;

/// Core abstractions (traits) that other layers implement
pub mod traits;
