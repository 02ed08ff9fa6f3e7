// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-based ELECTRA pretraining with Burn's DataLoader and Adam.
//
// One optimizer step:
//   1. the MLM hook masks the clean batch (dynamic masking)
//   2. the schedule yields this step's learning rate
//   3. generator → substitution → discriminator forward pass
//   4. weighted generator + discriminator loss, backward, Adam
//
// The run is measured in steps, not epochs: the data loader is
// restarted as often as needed until `total_steps` updates have
// been made. Checkpoints are written when the step count reaches
// each configured percentage of the run.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::{PreparedCorpus, PretrainConfig};
use crate::data::batcher::PretrainBatcher;
use crate::domain::error::ElectraError;
use crate::infra::checkpoint::{checkpoint_tag, CheckpointManager};
use crate::infra::metrics::{MetricsLogger, MetricsWindow};
use crate::ml::electra::ElectraModel;
use crate::ml::mlm_hook::MaskedLmHook;
use crate::ml::schedule::{linear_warmup_and_decay, WarmupDecaySchedule};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// What a finished run reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub steps:       usize,
    pub epochs:      usize,
    pub last_loss:   f64,
    pub checkpoints: Vec<String>,
}

pub fn run_training(
    cfg:          &PretrainConfig,
    corpus:       PreparedCorpus,
    ckpt_manager: CheckpointManager,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    let summary = train_loop::<MyBackend>(cfg, corpus, &ckpt_manager, device)?;
    tracing::info!(
        "Pretraining complete: {} steps over {} passes, last loss {:.4}, checkpoints {:?}",
        summary.steps, summary.epochs, summary.last_loss, summary.checkpoints
    );
    Ok(())
}

/// Step at which each checkpoint percentage is reached, with its tag.
pub fn checkpoint_schedule(total_steps: usize, percents: &[usize], run_name: &str) -> Vec<(usize, String)> {
    let mut points: Vec<(usize, String)> = percents
        .iter()
        .map(|&p| ((total_steps * p / 100).max(1), checkpoint_tag(run_name, p)))
        .collect();
    points.sort();
    points.dedup_by_key(|(step, _)| *step);
    points
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:          &PretrainConfig,
    corpus:       PreparedCorpus,
    ckpt_manager: &CheckpointManager,
    device:       B::Device,
) -> Result<TrainSummary> {
    let PreparedCorpus { special, vocab_size, dataset, .. } = corpus;
    if dataset.sample_count() == 0 {
        bail!("Cannot pretrain on an empty dataset");
    }

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: ElectraModel<B> = cfg.model_config(vocab_size, &special).init(&device);
    tracing::info!(
        "Model ready: {} layers, d_model={} (generator d_model={})",
        cfg.num_layers,
        cfg.d_model,
        cfg.d_model / cfg.generator_size_divisor.max(1),
    );

    // ── Loss, schedule, masking hook ──────────────────────────────────────────
    let loss_fn      = cfg.loss_config().init()?;
    let schedule_cfg = cfg.schedule_config();
    tracing::info!(
        "LR schedule: peak {:.3e}, first step {:.3e}, warm-up {:.2}% of the run",
        schedule_cfg.lr_max,
        linear_warmup_and_decay(0.0, &schedule_cfg)?,
        schedule_cfg.resolved_warmup_pct()? * 100.0,
    );
    let mut schedule = WarmupDecaySchedule::new(schedule_cfg)?;
    let masking      = cfg.masking_config(vocab_size, &special);
    let mut hook = match cfg.seed {
        Some(seed) => MaskedLmHook::with_seed(masking, true, seed)?,
        None => MaskedLmHook::new(masking, true)?,
    };

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(cfg.adam_epsilon).init();

    // ── Data loader (dynamic padding, reshuffled every pass) ─────────────────
    let batcher = PretrainBatcher::new(special.pad, cfg.max_length);
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed.unwrap_or(42))
        .num_workers(cfg.num_workers)
        .set_device(device.clone())
        .build(dataset);

    let metrics = MetricsLogger::new(ckpt_manager.dir())?;
    let mut window = MetricsWindow::default();
    let checkpoints = checkpoint_schedule(cfg.total_steps, &cfg.checkpoint_percents, &cfg.run_name);
    let mut saved = Vec::new();
    let mut last_loss = f64::NAN;
    let mut epochs = 0usize;

    // ── Step loop ─────────────────────────────────────────────────────────────
    'run: while !schedule.is_finished() {
        epochs += 1;
        for batch in loader.iter() {
            let step_batch = hook.begin_batch(batch.input_ids)?;
            let lr = schedule.step();
            let step = schedule.current_step();

            let (losses, _) = model.forward_loss(step_batch.inputs, step_batch.labels, &loss_fn)?;
            let total: f64 = losses.total.clone().into_scalar().elem::<f64>();
            if !total.is_finite() {
                return Err(ElectraError::InvalidLoss(format!("step {step}: loss is {total}")).into());
            }
            let gen_loss:  f64 = losses.generator.into_scalar().elem::<f64>();
            let disc_loss: f64 = losses.discriminator.into_scalar().elem::<f64>();
            window.add(total, gen_loss, disc_loss);
            last_loss = total;

            let grads = losses.total.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            if step % cfg.log_every == 0 || schedule.is_finished() {
                if let Some(m) = window.take(step, lr) {
                    tracing::info!(
                        "step {:>7}/{} | lr={:.3e} | loss={:.4} | gen={:.4} | disc={:.4}",
                        m.step, cfg.total_steps, m.lr, m.loss, m.gen_loss, m.disc_loss,
                    );
                    metrics.log(&m)?;
                }
            }

            for (_, tag) in checkpoints.iter().filter(|(at, _)| *at == step) {
                ckpt_manager.save_model(&model, tag)?;
                ckpt_manager.save_discriminator(&model.discriminator, tag)?;
                tracing::info!("Checkpoint '{}' saved at step {}", tag, step);
                saved.push(tag.clone());
            }

            if schedule.is_finished() {
                break 'run;
            }
        }
    }

    ckpt_manager.save_model(&model, &cfg.run_name)?;
    Ok(TrainSummary { steps: schedule.current_step(), epochs, last_loss, checkpoints: saved })
}
