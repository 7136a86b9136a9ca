// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training scalars to a CSV file.
//
// Output file: {logs_dir}/scalars.csv
//
//   metric,step,value
//   Loss/train,0,3.218400
//   Loss/train,1,3.104100
//   ...
//   Loss/val,0,2.954300
//
// Loss/train is written once per optimizer step, Loss/val once
// per epoch. Rows are appended, so several runs pointed at the
// same logs_dir accumulate in one file. A resumed run continues
// the step and epoch numbering of the run it resumes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::traits::ScalarSink;

pub const TRAIN_LOSS: &str = "Loss/train";
pub const VAL_LOSS:   &str = "Loss/val";

const CSV_FILE:   &str = "scalars.csv";
const CSV_HEADER: &str = "metric,step,value";

/// Summary of one finished epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 0-based epoch index
    pub epoch: usize,

    /// Mean loss over the epoch's training batches
    pub train_loss: f64,

    /// Mean loss over all validation batches (NaN when there are none)
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }

    /// Strictly lower than the best so far. NaN never improves.
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// The console line printed at the end of every epoch.
impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {:>3} | train_loss={:.4} | val_loss={:.4}",
            self.epoch + 1,
            self.train_loss,
            self.val_loss
        )
    }
}

/// Appends `metric,step,value` rows to `{logs_dir}/scalars.csv`.
pub struct CsvScalarLogger {
    csv_path: PathBuf,
    writer:   BufWriter<File>,
}

impl CsvScalarLogger {
    /// Writes the CSV header if the file is missing or empty.
    pub fn new(logs_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = logs_dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create logs dir '{}'", dir.display()))?;

        let csv_path = dir.join(CSV_FILE);
        let is_new   = fs::metadata(&csv_path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .with_context(|| format!("Cannot open '{}'", csv_path.display()))?;

        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{CSV_HEADER}")?;
            tracing::debug!("Created scalar log '{}'", csv_path.display());
        }

        Ok(Self { csv_path, writer })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl ScalarSink for CsvScalarLogger {
    fn add_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()> {
        writeln!(self.writer, "{name},{step},{value:.6}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
