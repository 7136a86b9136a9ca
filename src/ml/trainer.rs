// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and AdamW.
//
// Per training batch:
//   forward → next-token loss (pad ignored) → backward
//   → global gradient-norm clip at 1.0 → AdamW step
//   → Loss/train logged at the global step
//
// Per epoch:
//   validation on the inner backend (model.valid(), no autodiff
//   graph, no parameter mutation) → Loss/val logged at the epoch
//   → best.mpk if the validation loss strictly improved
//   → last.mpk always
//   → model_config.json, train_config.json, train_state.json
//
// The backend is chosen at runtime:
//   Cpu → Autodiff<NdArray>
//   Gpu → Autodiff<Wgpu>
// Training and validation batchers must match the backend of the
// model they feed, so the validation loader is built on
// B::InnerBackend.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::{BackendKind, TrainConfig};
use crate::data::{
    batcher::{QaBatch, QaBatcher},
    dataset::QaDataset,
};
use crate::domain::traits::ScalarSink;
use crate::infra::{
    checkpoint::{CheckpointKind, CheckpointManager, TrainState},
    metrics::{EpochMetrics, TRAIN_LOSS, VAL_LOSS},
};
use crate::ml::{
    clip::clip_grad_norm,
    model::{GptConfig, GptModel},
};

/// Global gradient norm threshold.
pub const MAX_GRAD_NORM: f64 = 1.0;

const WEIGHT_DECAY: f32 = 0.01;
const ADAM_EPSILON: f32 = 1e-8;

/// What a finished run reports back to the caller.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    /// Total optimizer steps, including those of resumed runs
    pub steps:         usize,
    pub best_val_loss: Option<f64>,
    pub best_epoch:    Option<usize>,
}

pub fn adamw_config() -> AdamWConfig {
    AdamWConfig::new()
        .with_epsilon(ADAM_EPSILON)
        .with_weight_decay(WEIGHT_DECAY)
}

pub fn run_training(
    cfg:       &TrainConfig,
    model_cfg: &GptConfig,
    train_ds:  QaDataset,
    val_ds:    QaDataset,
    ckpt:      &CheckpointManager,
    sink:      &mut dyn ScalarSink,
) -> Result<TrainSummary> {
    match cfg.backend {
        BackendKind::Gpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<Autodiff<Wgpu>>(cfg, model_cfg, train_ds, val_ds, ckpt, sink, device)
        }
        BackendKind::Cpu => {
            let device = NdArrayDevice::Cpu;
            tracing::info!("Using NdArray device: {:?}", device);
            train_loop::<Autodiff<NdArray>>(cfg, model_cfg, train_ds, val_ds, ckpt, sink, device)
        }
    }
}

/// Runs `cfg.epochs` epochs. With `cfg.resume` the weights come from
/// `last.mpk` and the step count, epoch count and best validation loss
/// from `train_state.json`; the saved architecture must equal
/// `model_cfg`. Nothing in `ckpt` is written before the first epoch
/// finishes.
pub fn train_loop<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    model_cfg: &GptConfig,
    train_ds:  QaDataset,
    val_ds:    QaDataset,
    ckpt:      &CheckpointManager,
    sink:      &mut dyn ScalarSink,
    device:    B::Device,
) -> Result<TrainSummary> {
    model_cfg.check_seq_len(cfg.max_length.saturating_sub(1))?;
    B::seed(cfg.seed);

    // ── Build or restore model ────────────────────────────────────────────────
    let (mut model, mut state): (GptModel<B>, TrainState) = if cfg.resume {
        anyhow::ensure!(
            ckpt.exists(CheckpointKind::Last),
            "Nothing to resume: '{}' does not exist",
            ckpt.model_path(CheckpointKind::Last).display()
        );
        ckpt.ensure_compatible(model_cfg)?;
        let state = ckpt.load_state()?;
        tracing::info!(
            "Resuming after epoch {} (step {}, best val_loss {:?})",
            state.epochs_done, state.steps, state.best_val_loss
        );
        (ckpt.restore(CheckpointKind::Last, &device)?, state)
    } else {
        (model_cfg.init(&device)?, TrainState::default())
    };
    tracing::info!(
        "Model ready: {} layers, {} heads, d_model={}, {} parameters",
        model_cfg.n_layers,
        model_cfg.n_heads,
        model_cfg.d_model,
        model.num_params()
    );

    let mut optim = adamw_config().init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(QaBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_ds);

    let val_loader = DataLoaderBuilder::new(QaBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(val_ds);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let first_epoch = state.epochs_done;
    for epoch in first_epoch..first_epoch + cfg.epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (next, loss) = train_step(model, &mut optim, batch, cfg.learning_rate, MAX_GRAD_NORM)?;
            model = next;

            sink.add_scalar(TRAIN_LOSS, loss, state.steps)?;
            if state.steps % 100 == 0 {
                tracing::info!("epoch {} step {} loss {:.4}", epoch, state.steps, loss);
            }
            state.steps    += 1;
            train_loss_sum += loss;
            train_batches  += 1;
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        let val_loss = validate(&model.valid(), val_loader.iter())?;
        if val_loss.is_nan() {
            tracing::warn!("Validation produced no loss for epoch {}; best checkpoint unchanged", epoch);
        }
        sink.add_scalar(VAL_LOSS, val_loss, epoch)?;
        sink.flush()?;

        let metrics = EpochMetrics::new(epoch, avg_train_loss, val_loss);
        println!("{metrics}");

        if metrics.is_improvement(state.best_val_loss.unwrap_or(f64::INFINITY)) {
            state.best_val_loss = Some(val_loss);
            state.best_epoch    = Some(epoch);
            ckpt.save_model(&model, CheckpointKind::Best)?;
            tracing::info!(
                "Saved best model to '{}' (epoch {})",
                ckpt.model_path(CheckpointKind::Best).display(),
                epoch
            );
        }
        ckpt.save_model(&model, CheckpointKind::Last)?;
        tracing::info!("Saved last model to '{}'", ckpt.model_path(CheckpointKind::Last).display());

        state.epochs_done = epoch + 1;
        ckpt.save_config(model_cfg)?;
        ckpt.save_train_config(cfg)?;
        ckpt.save_state(&state)?;
    }

    tracing::info!("Training complete after {} steps", state.steps);
    Ok(TrainSummary {
        steps:         state.steps,
        best_val_loss: state.best_val_loss,
        best_epoch:    state.best_epoch,
    })
}

/// One forward/backward/clip/update cycle. Returns the updated model
/// and the batch loss measured before the update.
pub fn train_step<B, O>(
    model:         GptModel<B>,
    optim:         &mut O,
    batch:         QaBatch<B>,
    lr:            f64,
    max_grad_norm: f64,
) -> Result<(GptModel<B>, f64)>
where
    B: AutodiffBackend,
    O: Optimizer<GptModel<B>, B>,
{
    let loss = model.forward_loss(batch.input_ids, Some(batch.attention_mask), batch.labels)?;
    let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

    let mut grads = GradientsParams::from_grads(loss.backward(), &model);
    clip_grad_norm::<B, _>(&model, &mut grads, max_grad_norm);

    Ok((optim.step(lr, model, grads), loss_val))
}

/// Mean loss over every batch. NaN when there are no batches.
pub fn validate<B: Backend>(
    model:   &GptModel<B>,
    batches: impl Iterator<Item = QaBatch<B>>,
) -> Result<f64> {
    let mut loss_sum = 0.0f64;
    let mut count    = 0usize;

    for batch in batches {
        let loss = model.forward_loss(batch.input_ids, Some(batch.attention_mask), batch.labels)?;
        loss_sum += loss.into_scalar().elem::<f64>();
        count    += 1;
    }

    Ok(if count > 0 { loss_sum / count as f64 } else { f64::NAN })
}
