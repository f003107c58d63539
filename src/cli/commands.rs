// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Three subcommands: `encode`, `train` and `predict`.
// Each Args struct converts into its application-layer config,
// so Layer 2 never sees clap types.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    encode_use_case::EncodeConfig,
    predict_use_case::PredictConfig,
    train_use_case::TrainConfig,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, tokenize and split a JSONL corpus into training files
    Encode(EncodeArgs),

    /// Train a model on encoded token files
    Train(TrainArgs),

    /// Generate text from a trained run
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSONL corpus; the "text" field of each line is used
    pub input_file: PathBuf,

    /// Where to write the output files (default: next to the input)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Characters per chunk; one chunk becomes one training line
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u64).range(1..))]
    pub context_window: u64,

    /// Fraction of lines (taken from the end) used for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_ratio: f64,

    /// Pretrained tokenizer.json (e.g. GPT-2); builds a word-level one if omitted
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Cap on corpus words in a built word-level vocabulary
    #[arg(long)]
    pub max_vocab: Option<usize>,
}

impl From<EncodeArgs> for EncodeConfig {
    fn from(a: EncodeArgs) -> Self {
        EncodeConfig {
            input_file:     a.input_file,
            output_dir:     a.output_dir,
            context_window: a.context_window as usize,
            val_ratio:      a.val_ratio,
            tokenizer:      a.tokenizer,
            max_vocab:      a.max_vocab,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = "data/training_data.txt")]
    pub train_file: PathBuf,

    #[arg(long, default_value = "data/validation_data.txt")]
    pub val_file: PathBuf,

    /// Skip validation even if the validation file exists
    #[arg(long)]
    pub no_validation: bool,

    #[arg(long, default_value = "data/tokenizer.json")]
    pub tokenizer: PathBuf,

    /// Each run is written to <runs_dir>/version_N
    #[arg(long, default_value = "runs")]
    pub runs_dir: PathBuf,

    #[arg(long, default_value_t = 768)]
    pub embed_size: usize,

    #[arg(long, default_value_t = 12)]
    pub num_layers: usize,

    /// embed_size must be divisible by heads
    #[arg(long, default_value_t = 16)]
    pub heads: usize,

    /// Feed-forward width = forward_expansion * embed_size
    #[arg(long, default_value_t = 4)]
    pub forward_expansion: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout_rate: f64,

    /// Defaults to the tokenizer's vocabulary size
    #[arg(long)]
    pub vocab_size: Option<usize>,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Tokens per line after padding/truncation; the model sees S-1
    #[arg(long, default_value_t = 128)]
    pub sequence_length: usize,

    #[arg(long, default_value_t = 1)]
    pub max_epochs: usize,

    /// Peak learning rate (min_lr is added on top)
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 1e-6)]
    pub min_lr: f64,

    /// Fraction of total steps spent warming up
    #[arg(long, default_value_t = 0.1)]
    pub warmup_fraction: f64,

    #[arg(long, default_value_t = 0)]
    pub padding_token: u32,

    /// Re-read lines from disk instead of holding the dataset in memory
    #[arg(long)]
    pub indexed: bool,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Shuffle seed for the training loader
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_file:        a.train_file,
            val_file:          (!a.no_validation).then_some(a.val_file),
            tokenizer_path:    a.tokenizer,
            runs_dir:          a.runs_dir,
            embed_size:        a.embed_size,
            num_layers:        a.num_layers,
            heads:             a.heads,
            forward_expansion: a.forward_expansion,
            dropout_rate:      a.dropout_rate,
            vocab_size:        a.vocab_size,
            batch_size:        a.batch_size,
            sequence_length:   a.sequence_length,
            max_epochs:        a.max_epochs,
            learning_rate:     a.learning_rate,
            weight_decay:      a.weight_decay,
            min_lr:            a.min_lr,
            warmup_fraction:   a.warmup_fraction,
            padding_token:     a.padding_token,
            in_memory:         !a.indexed,
            num_workers:       a.num_workers,
            seed:              a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Text to continue
    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value = "runs")]
    pub runs_dir: PathBuf,

    /// Run version to load (default: newest)
    #[arg(long)]
    pub version: Option<usize>,

    #[arg(long, default_value_t = 1.0)]
    pub temperature: f32,

    /// Nucleus sampling threshold in (0, 1]
    #[arg(long, default_value_t = 0.9)]
    pub top_p: f32,

    /// Default: the model's sequence_length
    #[arg(long)]
    pub max_new_tokens: Option<usize>,

    /// Seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            runs_dir:       a.runs_dir,
            version:        a.version,
            prompt:         a.prompt,
            temperature:    a.temperature,
            top_p:          a.top_p,
            max_new_tokens: a.max_new_tokens,
            seed:           a.seed,
        }
    }
}
