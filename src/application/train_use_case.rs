// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration          (Layer 2)
//   Step 2: Load the vocabulary                 (Layer 6 - infra)
//   Step 3: Load train / validation records     (Layer 4 - data)
//   Step 4: Build datasets                      (Layer 4 - data)
//   Step 5: Open checkpoint dir + scalar log    (Layer 6 - infra)
//   Step 6: Run training loop                   (Layer 5 - ml)
//
// Config files are written by the training loop at the end of each
// epoch, so a rejected `--resume` leaves the existing ones intact.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{dataset::QaDataset, loader::JsonlLoader};
use crate::domain::{
    error::{GptError, GptResult},
    traits::RecordSource,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::CsvScalarLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    model::GptConfig,
    trainer::{run_training, TrainSummary},
};

/// Compute device the training loop runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// NdArray on the CPU
    Cpu,
    /// WGPU on the default GPU adapter
    Gpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All knobs for a training run. Saved as train_config.json next
// to the checkpoints so a run can be reproduced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_path:       String,
    pub val_path:         String,
    pub vocab_path:       String,
    pub model_output_dir: String,
    pub logs_dir:         String,

    /// Encoded length before the one-token shift; the model sees
    /// sequences of `max_length - 1` tokens.
    pub max_length:    usize,
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,

    pub n_layers: usize,
    pub n_heads:  usize,
    pub d_model:  usize,
    pub d_ff:     usize,
    pub d_k:      usize,
    pub d_v:      usize,
    pub max_pos:  usize,

    pub num_workers: usize,
    pub seed:        u64,
    pub backend:     BackendKind,

    /// Start from `last.mpk` in `model_output_dir` instead of fresh weights
    pub resume: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:       "data/train.json".to_string(),
            val_path:         "data/val.json".to_string(),
            vocab_path:       "data/vocab.json".to_string(),
            model_output_dir: "output".to_string(),
            logs_dir:         "logs".to_string(),
            max_length:       120,
            epochs:           100,
            batch_size:       128,
            learning_rate:    2e-4,
            n_layers:         6,
            n_heads:          12,
            d_model:          768,
            d_ff:             2048,
            d_k:              64,
            d_v:              64,
            max_pos:          1800,
            num_workers:      4,
            seed:             42,
            backend:          BackendKind::Cpu,
            resume:           false,
        }
    }
}

impl TrainConfig {
    /// Architecture hyperparameters for a vocabulary of `vocab_size` tokens.
    pub fn model_config(&self, vocab_size: usize) -> GptConfig {
        GptConfig {
            vocab_size,
            max_pos:  self.max_pos,
            d_model:  self.d_model,
            n_heads:  self.n_heads,
            d_k:      self.d_k,
            d_v:      self.d_v,
            d_ff:     self.d_ff,
            n_layers: self.n_layers,
        }
    }

    /// Reject settings that would fail later, before any file is touched.
    pub fn validate(&self) -> GptResult<()> {
        if self.max_length < 2 {
            return Err(GptError::config(format!(
                "max_length must be at least 2, got {}",
                self.max_length
            )));
        }
        if self.batch_size == 0 {
            return Err(GptError::config("batch_size must be positive"));
        }
        if self.num_workers == 0 {
            return Err(GptError::config("num_workers must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(GptError::config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        // Vocabulary size is unknown here; any positive value checks the rest.
        let model_cfg = self.model_config(1);
        model_cfg.validate()?;
        model_cfg.check_seq_len(self.max_length - 1)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Fail fast on bad hyperparameters ─────────────────────────
        cfg.validate().context("Invalid training configuration")?;

        // ── Step 2: Vocabulary ───────────────────────────────────────────────
        let tokenizer  = TokenizerStore::new(&cfg.vocab_path).load()?;
        let vocab_size = tokenizer.vocab_size();

        // ── Step 3: Records ──────────────────────────────────────────────────
        tracing::info!("Start loading train data from '{}'", cfg.train_path);
        let train_records = JsonlLoader::new(&cfg.train_path).load_all()?;
        tracing::info!("Start loading validation data from '{}'", cfg.val_path);
        let val_records = JsonlLoader::new(&cfg.val_path).load_all()?;
        if val_records.is_empty() {
            tracing::warn!("Validation set is empty; no best checkpoint will be written");
        }

        // ── Step 4: Burn datasets ────────────────────────────────────────────
        let train_ds = QaDataset::new(train_records, tokenizer.clone(), cfg.max_length);
        let val_ds   = QaDataset::new(val_records, tokenizer, cfg.max_length);

        // ── Step 5: Checkpoint dir + scalar log ──────────────────────────────
        let model_cfg = cfg.model_config(vocab_size);
        let ckpt      = CheckpointManager::new(&cfg.model_output_dir)?;
        let mut sink  = CsvScalarLogger::new(&cfg.logs_dir)?;

        // ── Step 6: Train ────────────────────────────────────────────────────
        tracing::info!("Start training, scalars go to '{}'", sink.csv_path().display());
        run_training(cfg, &model_cfg, train_ds, val_ds, &ckpt, &mut sink)
    }
}
