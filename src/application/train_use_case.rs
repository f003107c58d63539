// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Validate the configuration
//   Step 2: Load the tokenizer            (Layer 6 - infra)
//   Step 3: Open train/validation files   (Layer 4 - data)
//   Step 4: Resolve and check vocab_size
//   Step 5: Allocate runs/version_N       (Layer 6 - infra)
//   Step 6: Save hparams.json             (Layer 6 - infra)
//   Step 7: Run the training loop         (Layer 5 - ml)

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::dataset::TokenizedTextDataset;
use crate::domain::error::{LmError, LmResult};
use crate::domain::traits::TextTokenizer;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::HfTokenizer};
use crate::ml::model::GptConfig;
use crate::ml::trainer::{run_training, TrainSummary};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyperparameter of a run. Saved as hparams.json in the run
// directory so `predict` can rebuild the identical model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub train_file:        PathBuf,
    pub val_file:          Option<PathBuf>,
    pub tokenizer_path:    PathBuf,
    pub runs_dir:          PathBuf,

    pub embed_size:        usize,
    pub num_layers:        usize,
    pub heads:             usize,
    pub forward_expansion: usize,
    pub dropout_rate:      f64,
    /// None = take it from the tokenizer; always Some in a saved hparams.json
    pub vocab_size:        Option<usize>,

    pub batch_size:        usize,
    pub sequence_length:   usize,
    pub max_epochs:        usize,

    pub learning_rate:     f64,
    pub weight_decay:      f64,
    pub min_lr:            f64,
    pub warmup_fraction:   f64,

    pub padding_token:     u32,
    pub in_memory:         bool,
    pub num_workers:       usize,
    pub seed:              u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_file:        PathBuf::from("data/training_data.txt"),
            val_file:          Some(PathBuf::from("data/validation_data.txt")),
            tokenizer_path:    PathBuf::from("data/tokenizer.json"),
            runs_dir:          PathBuf::from("runs"),
            embed_size:        768,
            num_layers:        12,
            heads:             16,
            forward_expansion: 4,
            dropout_rate:      0.1,
            vocab_size:        None,
            batch_size:        32,
            sequence_length:   128,
            max_epochs:        1,
            learning_rate:     1e-3,
            weight_decay:      0.01,
            min_lr:            1e-6,
            warmup_fraction:   0.1,
            padding_token:     0,
            in_memory:         true,
            num_workers:       1,
            seed:              42,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> LmResult<()> {
        if self.sequence_length < 2 {
            return Err(LmError::InvalidConfig(format!(
                "sequence_length must be at least 2, got {}",
                self.sequence_length
            )));
        }
        if self.batch_size == 0 || self.max_epochs == 0 || self.num_workers == 0 {
            return Err(LmError::InvalidConfig(
                "batch_size, max_epochs and num_workers must all be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.warmup_fraction) {
            return Err(LmError::InvalidConfig(format!(
                "warmup_fraction must be in [0, 1), got {}",
                self.warmup_fraction
            )));
        }
        Ok(())
    }

    /// The architecture for this run; the positional table covers `sequence_length`.
    pub fn model_config(&self, vocab_size: usize) -> GptConfig {
        GptConfig::new(vocab_size, self.embed_size, self.num_layers, self.heads, self.sequence_length)
            .with_forward_expansion(self.forward_expansion)
            .with_dropout_rate(self.dropout_rate)
    }
}

/// Where a finished run lives and how it went.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub version: usize,
    pub run_dir: PathBuf,
    pub summary: TrainSummary,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train on the default GPU backend.
    pub fn execute(&self) -> Result<TrainOutcome> {
        type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<MyBackend>(device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainOutcome> {
        let mut cfg = self.config.clone();

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = HfTokenizer::from_file(&cfg.tokenizer_path)?;

        // ── Step 3: Datasets ──────────────────────────────────────────────────
        let train = TokenizedTextDataset::open(
            &cfg.train_file,
            cfg.sequence_length,
            cfg.padding_token,
            cfg.in_memory,
        )?;
        let val = match &cfg.val_file {
            Some(path) if path.exists() => Some(TokenizedTextDataset::open(
                path,
                cfg.sequence_length,
                cfg.padding_token,
                cfg.in_memory,
            )?),
            Some(path) => {
                tracing::warn!("Validation file '{}' not found; skipping validation", path.display());
                None
            }
            None => None,
        };
        if train.is_empty() {
            return Err(LmError::InvalidInput(format!(
                "training file '{}' has no samples",
                cfg.train_file.display()
            ))
            .into());
        }

        // ── Step 4: Vocabulary ────────────────────────────────────────────────
        let vocab_size = cfg.vocab_size.unwrap_or_else(|| tokenizer.vocab_size());
        check_vocab(vocab_size, &train).context("Training data does not fit the vocabulary")?;
        if let Some(val) = &val {
            check_vocab(vocab_size, val).context("Validation data does not fit the vocabulary")?;
        }
        cfg.vocab_size = Some(vocab_size);

        let model_cfg = cfg.model_config(vocab_size);
        model_cfg.validate()?;

        // ── Step 5 + 6: Run directory and hparams ─────────────────────────────
        let run = CheckpointManager::create_run(&cfg.runs_dir)?;
        run.save_hparams(&cfg)?;

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        let summary = run_training::<B>(&cfg, &model_cfg, train, val, &run, device)?;

        Ok(TrainOutcome { version: run.version(), run_dir: run.dir().to_path_buf(), summary })
    }
}

fn check_vocab(vocab_size: usize, dataset: &TokenizedTextDataset) -> LmResult<()> {
    match dataset.max_token() {
        Some(max) if max as usize >= vocab_size => Err(LmError::InvalidConfig(format!(
            "token id {max} is outside vocab_size {vocab_size}"
        ))),
        _ => Ok(()),
    }
}
