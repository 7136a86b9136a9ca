// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer is written against these traits so the
// concrete sources and sinks can be swapped (a JSONL file today,
// a different store tomorrow; a CSV scalar log today, an
// in-memory recorder in tests).

use anyhow::Result;
use crate::domain::qa_pair::QaPair;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Anything that can produce the full list of question/answer records.
///
/// Implementations:
///   - JsonlLoader → reads one JSON object per line from a file
pub trait RecordSource {
    fn load_all(&self) -> Result<Vec<QaPair>>;
}

// ─── ScalarSink ───────────────────────────────────────────────────────────────
/// Receives `(metric_name, value, step)` triples from the training loop.
///
/// The training loop only ever writes to the sink; nothing it records
/// feeds back into training decisions.
///
/// Implementations:
///   - CsvScalarLogger → appends rows to logs_dir/scalars.csv
pub trait ScalarSink {
    fn add_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()>;

    /// Flush any buffered output. Default is a no-op.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
