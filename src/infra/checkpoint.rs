// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's
// NamedMpkFileRecorder at full precision, so a reloaded model
// produces bit-identical outputs.
//
// Directory layout (model_output_dir):
//   best.mpk            ← weights with the lowest validation loss
//   last.mpk            ← weights after the most recent epoch
//   model_config.json   ← GptConfig needed to rebuild the model
//   train_config.json   ← the full TrainConfig of the run
//   train_state.json    ← epochs/steps done and the best val loss,
//                         read back by `train --resume`
//
// Every file is first written under a temporary name and then
// renamed over the final path. A crash mid-write leaves the
// previous checkpoint untouched.
//
// The recorder always replaces the file extension with ".mpk",
// so temporary weight files use a distinct stem ("best_partial")
// rather than a ".tmp" suffix.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::GptError;
use crate::ml::model::{GptConfig, GptModel};

const MODEL_CONFIG_FILE: &str = "model_config.json";
const TRAIN_CONFIG_FILE: &str = "train_config.json";
const TRAIN_STATE_FILE:  &str = "train_state.json";

/// Progress of a run, rewritten after every epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainState {
    /// Epochs completed, summed over every resumed run
    pub epochs_done: usize,

    /// Optimizer steps completed; the next Loss/train row uses this index
    pub steps: usize,

    /// Validation loss of `best.mpk`, None until one was written
    pub best_val_loss: Option<f64>,
    pub best_epoch:    Option<usize>,
}

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Which of the two rolling checkpoints to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    Best,
    Last,
}

impl CheckpointKind {
    pub fn stem(self) -> &'static str {
        match self {
            CheckpointKind::Best => "best",
            CheckpointKind::Last => "last",
        }
    }
}

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Final path of a weights file, e.g. `{dir}/best.mpk`.
    pub fn model_path(&self, kind: CheckpointKind) -> PathBuf {
        self.dir.join(kind.stem()).with_extension("mpk")
    }

    pub fn exists(&self, kind: CheckpointKind) -> bool {
        self.model_path(kind).is_file()
    }

    /// Write the model weights, replacing any previous checkpoint of
    /// the same kind.
    pub fn save_model<B: Backend>(&self, model: &GptModel<B>, kind: CheckpointKind) -> Result<()> {
        let partial = self.dir.join(format!("{}_partial", kind.stem()));
        model
            .clone()
            .save_file(partial.clone(), &Recorder::new())
            .map_err(|e| anyhow!("Failed to save checkpoint '{}': {e:?}", partial.display()))?;

        let final_path = self.model_path(kind);
        fs::rename(partial.with_extension("mpk"), &final_path)
            .with_context(|| format!("Cannot move checkpoint into '{}'", final_path.display()))?;

        tracing::debug!("Saved {} checkpoint to '{}'", kind.stem(), final_path.display());
        Ok(())
    }

    /// Load saved weights into `model`, which must have the same
    /// architecture as the checkpoint.
    pub fn load_model<B: Backend>(
        &self,
        model:  GptModel<B>,
        kind:   CheckpointKind,
        device: &B::Device,
    ) -> Result<GptModel<B>> {
        let path = self.model_path(kind);
        tracing::info!("Loading {} checkpoint from '{}'", kind.stem(), path.display());
        model
            .load_file(path.clone(), &Recorder::new(), device)
            .map_err(|e| {
                anyhow!(
                    "Cannot load checkpoint '{}'. Have you trained the model first? ({e:?})",
                    path.display()
                )
            })
    }

    pub fn save_config(&self, cfg: &GptConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomic(&self.dir.join(MODEL_CONFIG_FILE), json.as_bytes())?;
        tracing::debug!("Saved model config to '{}'", self.dir.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<GptConfig> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read model config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_train_config(&self, cfg: &TrainConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomic(&self.dir.join(TRAIN_CONFIG_FILE), json.as_bytes())
    }

    pub fn save_state(&self, state: &TrainState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.dir.join(TRAIN_STATE_FILE), json.as_bytes())
    }

    pub fn load_state(&self) -> Result<TrainState> {
        let path = self.dir.join(TRAIN_STATE_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read training state '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Fail unless `model_config.json` describes exactly `cfg`.
    pub fn ensure_compatible(&self, cfg: &GptConfig) -> Result<()> {
        let saved = self.load_config()?;
        if serde_json::to_value(&saved)? != serde_json::to_value(cfg)? {
            return Err(GptError::config(format!(
                "checkpoints in '{}' were trained with {:?}, requested {:?}",
                self.dir.display(),
                saved,
                cfg
            ))
            .into());
        }
        Ok(())
    }

    /// Rebuild a model from `model_config.json` and load its weights.
    pub fn restore<B: Backend>(&self, kind: CheckpointKind, device: &B::Device) -> Result<GptModel<B>> {
        let cfg   = self.load_config()?;
        let model = cfg.init::<B>(device)?;
        self.load_model(model, kind, device)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> GptConfig {
        GptConfig {
            vocab_size: 7,
            max_pos:    8,
            d_model:    8,
            n_heads:    2,
            d_k:        4,
            d_v:        4,
            d_ff:       16,
            n_layers:   2,
        }
    }

    fn logits(model: &GptModel<TestBackend>) -> Vec<f32> {
        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[3, 4, 5, 2, 0]], &Default::default());
        model.forward(ids, None).unwrap().logits.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_reload_reproduces_identical_outputs() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let model = tiny_config().init::<TestBackend>(&device).unwrap();
        ckpt.save_config(&tiny_config()).unwrap();
        ckpt.save_model(&model, CheckpointKind::Best).unwrap();

        assert!(ckpt.exists(CheckpointKind::Best));
        assert!(!ckpt.exists(CheckpointKind::Last));
        assert!(!dir.path().join("best_partial.mpk").exists());

        let restored = ckpt.restore::<TestBackend>(CheckpointKind::Best, &device).unwrap();
        assert_eq!(logits(&model), logits(&restored));
    }

    #[test]
    fn test_save_overwrites_previous_checkpoint() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let first  = tiny_config().init::<TestBackend>(&device).unwrap();
        let second = tiny_config().init::<TestBackend>(&device).unwrap();
        ckpt.save_model(&first, CheckpointKind::Last).unwrap();
        ckpt.save_model(&second, CheckpointKind::Last).unwrap();

        let fresh  = tiny_config().init::<TestBackend>(&device).unwrap();
        let loaded = ckpt.load_model(fresh, CheckpointKind::Last, &device).unwrap();
        assert_eq!(logits(&loaded), logits(&second));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        assert!(ckpt.load_model(model, CheckpointKind::Best, &Default::default()).is_err());
        assert!(ckpt.load_config().is_err());
    }

    #[test]
    fn test_state_roundtrip_and_architecture_check() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.load_state().is_err());

        let state = TrainState { epochs_done: 3, steps: 12, best_val_loss: Some(1.5), best_epoch: Some(1) };
        ckpt.save_state(&state).unwrap();
        assert_eq!(ckpt.load_state().unwrap(), state);

        ckpt.save_config(&tiny_config()).unwrap();
        ckpt.ensure_compatible(&tiny_config()).unwrap();

        let mut wider = tiny_config();
        wider.d_model = 16;
        wider.d_k     = 8;
        wider.d_v     = 8;
        let err = ckpt.ensure_compatible(&wider).unwrap_err();
        assert!(matches!(err.downcast_ref::<GptError>(), Some(GptError::Configuration(_))));
    }

    #[test]
    fn test_config_files_are_written() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nested")).unwrap();
        ckpt.save_config(&tiny_config()).unwrap();
        ckpt.save_train_config(&TrainConfig::default()).unwrap();

        assert_eq!(ckpt.load_config().unwrap().d_model, 8);
        let json = fs::read_to_string(dir.path().join("nested").join(TRAIN_CONFIG_FILE)).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_length, TrainConfig::default().max_length);
    }
}
