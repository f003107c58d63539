// ============================================================
// Layer 5 - Training Loop
// ============================================================
// One optimisation step:
//
//   logits = model(inputs, masks)           (seq, batch, vocab)
//   loss   = masked_loss(logits, targets, masks)
//   grads  = loss.backward()
//   lr     = scheduler.step()                warmup / cosine
//   model  = AdamW.step(lr, model, grads)
//
// The full loop runs every epoch over the training loader, then
// evaluates the masked loss on the validation set and writes a
// checkpoint plus one metrics row.
//
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - the validation batcher must also use B::InnerBackend

use anyhow::{Context, Result};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{LmBatch, LmBatcher},
    dataset::TokenizedTextDataset,
};
use crate::domain::error::LmResult;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    loss::masked_loss,
    model::{GptConfig, GptModel},
    scheduler::WarmupCosineLr,
};

/// Result of a single optimizer step.
pub struct StepOutput<B: Backend> {
    pub model:         GptModel<B>,
    pub loss:          f64,
    pub learning_rate: f64,
}

pub fn train_step<B, O>(
    model:     GptModel<B>,
    optim:     &mut O,
    scheduler: &mut WarmupCosineLr,
    batch:     LmBatch<B>,
) -> LmResult<StepOutput<B>>
where
    B: AutodiffBackend,
    O: Optimizer<GptModel<B>, B>,
{
    let logits = model.forward(batch.inputs, Some(batch.masks.clone()))?;
    let loss   = masked_loss(logits, batch.targets, batch.masks)?;

    let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();

    let grads = loss.backward();
    let grads = GradientsParams::from_grads(grads, &model);

    let learning_rate = scheduler.step();
    let model         = optim.step(learning_rate, model, grads);

    Ok(StepOutput { model, loss: loss_value, learning_rate })
}

/// Mean masked loss over `batches`; None when there are no batches.
pub fn evaluate<B, I>(model: &GptModel<B>, batches: I) -> LmResult<Option<f64>>
where
    B: Backend,
    I: IntoIterator<Item = LmBatch<B>>,
{
    let mut loss_sum = 0.0f64;
    let mut count    = 0usize;

    for batch in batches {
        let logits = model.forward(batch.inputs, Some(batch.masks.clone()))?;
        let loss   = masked_loss(logits, batch.targets, batch.masks)?;
        loss_sum += loss.into_scalar().elem::<f64>();
        count    += 1;
    }

    Ok((count > 0).then(|| loss_sum / count as f64))
}

/// Mean step loss of one epoch. An epoch without batches is an error.
fn epoch_train_loss(epoch: usize, loss_sum: f64, batches: usize) -> Result<f64> {
    anyhow::ensure!(batches > 0, "Epoch {epoch} produced no training batches");
    Ok(loss_sum / batches as f64)
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs:     usize,
    pub steps:      usize,
    pub train_loss: f64,
    pub val_loss:   Option<f64>,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    model_cfg:     &GptConfig,
    train_dataset: TokenizedTextDataset,
    val_dataset:   Option<TokenizedTextDataset>,
    run:           &CheckpointManager,
    device:        B::Device,
) -> Result<TrainSummary> {

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: GptModel<B> = model_cfg.init(&device)?;
    tracing::info!(
        "Model ready: {} layers, embed_size={}, heads={}, vocab_size={}, {} parameters",
        model_cfg.num_layers,
        model_cfg.embed_size,
        model_cfg.heads,
        model_cfg.vocab_size,
        model.num_params(),
    );

    // ── AdamW + warmup/cosine schedule ────────────────────────────────────────
    let mut optim = AdamWConfig::new()
        .with_weight_decay(cfg.weight_decay as f32)
        .init();

    let total_steps  = WarmupCosineLr::total_steps_for(cfg.max_epochs, train_dataset.len(), cfg.batch_size);
    let warmup_steps = (total_steps as f64 * cfg.warmup_fraction).floor() as usize;
    let mut scheduler = WarmupCosineLr::new(cfg.learning_rate, cfg.min_lr, warmup_steps, total_steps)
        .context("Cannot build learning-rate schedule (is the training set empty?)")?;
    tracing::info!("Schedule: {} steps, {} warmup", total_steps, warmup_steps);

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::new(LmBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend, no autodiff overhead) ───────────
    let val_loader = val_dataset.filter(|d| !d.is_empty()).map(|d| {
        DataLoaderBuilder::new(LmBatcher::<B::InnerBackend>::new(device.clone()))
            .batch_size(cfg.batch_size)
            .num_workers(cfg.num_workers)
            .build(d)
    });

    let metrics       = MetricsLogger::new(run.dir())?;
    let mut summary   = TrainSummary { epochs: 0, steps: 0, train_loss: f64::NAN, val_loss: None };
    let mut best_val  = f64::INFINITY;
    let mut last_lr   = cfg.min_lr;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.max_epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in train_loader.iter() {
            let out = train_step(model, &mut optim, &mut scheduler, batch)
                .with_context(|| format!("Training step {} failed", summary.steps + 1))?;
            model = out.model;

            summary.steps = scheduler.current_step();
            loss_sum     += out.loss;
            batches      += 1;
            last_lr       = out.learning_rate;

            tracing::debug!("step {} loss={:.4} lr={:.3e}", summary.steps, out.loss, out.learning_rate);
        }

        let train_loss = epoch_train_loss(epoch, loss_sum, batches)?;

        // model.valid() -> GptModel<B::InnerBackend>, dropout disabled
        let val_loss = match &val_loader {
            Some(loader) => evaluate(&model.valid(), loader.iter())?,
            None => None,
        };

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={} | lr={:.3e}",
            epoch,
            cfg.max_epochs,
            train_loss,
            val_loss.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}")),
            last_lr,
        );

        let row = EpochMetrics { epoch, steps: summary.steps, train_loss, val_loss, learning_rate: last_lr };
        if row.is_improvement(best_val) {
            best_val = row.val_loss.unwrap_or(best_val);
            tracing::info!("New best validation loss {:.4}", best_val);
        }
        metrics.log(&row)?;
        run.save_model(&model, epoch)?;

        summary.epochs     = epoch;
        summary.train_loss = train_loss;
        summary.val_loss   = val_loss;
    }

    tracing::info!("Training complete: {} epochs, {} steps", summary.epochs, summary.steps);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::LmSample;
    use crate::ml::model::tests::tiny_config;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;
    use std::io::Write;

    type TestBackend = Autodiff<NdArray>;

    fn batch(lines: &[&[u32]]) -> LmBatch<TestBackend> {
        let items: Vec<LmSample> = lines
            .iter()
            .map(|l| LmSample::from_tokens(l, 6, 0).unwrap())
            .collect();
        LmBatcher::<TestBackend>::new(Default::default()).batch(items)
    }

    fn row(model: &GptModel<TestBackend>, id: usize) -> Vec<f32> {
        let embed = model.embed_size();
        model
            .embedding
            .weight
            .val()
            .slice([id..id + 1, 0..embed])
            .into_data()
            .to_vec()
            .unwrap()
    }

    #[test]
    fn test_step_updates_tied_weight_through_output_role() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let mut optim     = AdamWConfig::new().with_weight_decay(0.0).init();
        let mut scheduler = WarmupCosineLr::new(1e-2, 0.0, 0, 10).unwrap();

        // token 10 never appears as an input; only the output projection can move it
        let before = row(&model, 10);
        let out    = train_step(model, &mut optim, &mut scheduler, batch(&[&[1, 2, 3, 4, 5, 6]])).unwrap();
        let after  = row(&out.model, 10);

        assert!(out.loss.is_finite());
        assert_ne!(before, after);
        assert_eq!(
            out.model.output_weight().into_data(),
            out.model.embedding.weight.val().into_data()
        );
    }

    #[test]
    fn test_step_advances_scheduler() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let mut optim     = AdamWConfig::new().init();
        let mut scheduler = WarmupCosineLr::new(1e-3, 1e-6, 2, 10).unwrap();

        let out = train_step(model, &mut optim, &mut scheduler, batch(&[&[1, 2, 3]])).unwrap();
        assert!((out.learning_rate - 1e-6).abs() < 1e-12);
        assert_eq!(scheduler.current_step(), 1);
    }

    #[test]
    fn test_repeated_steps_reduce_loss() {
        let mut model     = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let mut optim     = AdamWConfig::new().with_weight_decay(0.0).init();
        let mut scheduler = WarmupCosineLr::new(1e-2, 0.0, 0, 100).unwrap();

        let mut losses = Vec::new();
        for _ in 0..30 {
            let out = train_step(model, &mut optim, &mut scheduler, batch(&[&[1, 2, 3, 4, 5, 6], &[7, 8, 9]])).unwrap();
            model = out.model;
            losses.push(out.loss);
        }
        assert!(losses[29] < losses[0], "{losses:?}");
    }

    #[test]
    fn test_evaluate_averages_batches() {
        let model = tiny_config().init::<NdArray>(&Default::default()).unwrap();
        let batcher = LmBatcher::<NdArray>::new(Default::default());
        let one = batcher.batch(vec![LmSample::from_tokens(&[1, 2, 3], 6, 0).unwrap()]);

        let single = evaluate(&model, vec![one.clone()]).unwrap().unwrap();
        let double = evaluate(&model, vec![one.clone(), one]).unwrap().unwrap();
        assert!((single - double).abs() < 1e-6);
        assert_eq!(evaluate(&model, Vec::new()).unwrap(), None);
    }

    #[test]
    fn test_epoch_without_batches_is_an_error() {
        assert!((epoch_train_loss(1, 6.0, 3).unwrap() - 2.0).abs() < 1e-12);

        let err = epoch_train_loss(2, 0.0, 0).unwrap_err();
        assert!(err.to_string().contains("Epoch 2 produced no training batches"));
    }

    #[test]
    fn test_run_training_writes_checkpoints_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, lines: &[&str]| {
            let path = dir.path().join(name);
            let mut f = std::fs::File::create(&path).unwrap();
            for l in lines {
                writeln!(f, "{l}").unwrap();
            }
            path
        };
        let train_path = write("train.txt", &["1 2 3 4 5", "6 7 8", "9 10 1 2"]);
        let val_path   = write("val.txt", &["3 4 5"]);

        let cfg = TrainConfig {
            embed_size:      8,
            num_layers:      1,
            heads:           2,
            batch_size:      2,
            sequence_length: 6,
            max_epochs:      2,
            dropout_rate:    0.0,
            num_workers:     1,
            ..TrainConfig::default()
        };
        let model_cfg = GptConfig::new(11, 8, 1, 2, 6).with_dropout_rate(0.0);

        let train = TokenizedTextDataset::open(&train_path, 6, 0, true).unwrap();
        let val   = TokenizedTextDataset::open(&val_path, 6, 0, false).unwrap();
        let run   = CheckpointManager::create_run(dir.path().join("runs")).unwrap();

        let summary = run_training::<TestBackend>(&cfg, &model_cfg, train, Some(val), &run, Default::default()).unwrap();

        assert_eq!(summary.epochs, 2);
        assert_eq!(summary.steps, 4);
        assert!(summary.val_loss.is_some());
        assert_eq!(run.latest_epoch().unwrap(), 2);
        assert!(run.dir().join("model_epoch_1.mpk.gz").exists());

        let csv = std::fs::read_to_string(run.dir().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }
}
