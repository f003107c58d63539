// ============================================================
// Layer 2 - PredictUseCase
// ============================================================
// Generates text from a trained run:
//
//   Step 1: Open runs/version_N (newest unless one is given)
//   Step 2: Read hparams.json and rebuild the architecture
//   Step 3: Load the tokenizer recorded in hparams
//   Step 4: Load the newest checkpoint into the model
//   Step 5: Sample with the Decoder
//
// Inference runs on the plain (non-autodiff) backend, so
// dropout is inactive.

use anyhow::{Context, Result};
use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;

use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::HfTokenizer};
use crate::ml::decoder::{Decoder, Generation};

#[derive(Debug, Clone)]
pub struct PredictConfig {
    pub runs_dir:       PathBuf,
    pub version:        Option<usize>,
    pub prompt:         String,
    pub temperature:    f32,
    pub top_p:          f32,
    /// None = up to the model's sequence_length
    pub max_new_tokens: Option<usize>,
    /// Fixed seed for reproducible sampling; None draws from OS entropy
    pub seed:           Option<u64>,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            runs_dir:       PathBuf::from("runs"),
            version:        None,
            prompt:         String::new(),
            temperature:    1.0,
            top_p:          0.9,
            max_new_tokens: None,
            seed:           None,
        }
    }
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Generation> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        self.execute_on::<burn::backend::Wgpu>(device)
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<Generation> {
        let cfg = &self.config;

        // Fail on bad sampling settings before touching the disk
        let decoder = Decoder::new(cfg.temperature, cfg.top_p, cfg.max_new_tokens)?;

        // ── Step 1 + 2: Run and architecture ──────────────────────────────────
        let run     = CheckpointManager::open_run(&cfg.runs_dir, cfg.version)?;
        let hparams = run.load_hparams()?;
        let vocab   = hparams
            .vocab_size
            .with_context(|| format!("hparams.json in '{}' has no vocab_size", run.dir().display()))?;

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = HfTokenizer::from_file(&hparams.tokenizer_path)?;

        // ── Step 4: Weights ───────────────────────────────────────────────────
        let model = hparams.model_config(vocab).init::<B>(&device)?;
        let model = run.load_model(model, &device)?;
        tracing::info!("Loaded run version {} ({} parameters)", run.version(), model.num_params());

        // ── Step 5: Sample ────────────────────────────────────────────────────
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let generation = decoder.generate(&model, &tokenizer, &cfg.prompt, &mut rng)?;

        tracing::info!(
            "Generated {} tokens (stopped_on_eot={})",
            generation.tokens.len(),
            generation.stopped_on_eot
        );
        Ok(generation)
    }
}
