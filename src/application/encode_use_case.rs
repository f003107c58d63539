// ============================================================
// Layer 2 - EncodeUseCase
// ============================================================
// Turns a raw JSONL corpus into the token files training reads:
//
//   Step 1: Load records              (Layer 4 - JsonlLoader)
//   Step 2: Join texts with spaces
//   Step 3: Cut context_window-char chunks, one line each
//             -> structured_data.txt
//   Step 4: Load or build the tokenizer (Layer 6)
//   Step 5: Encode every chunk
//             -> encoded_data.txt
//   Step 6: Split off the last val_ratio of lines
//             -> training_data.txt / validation_data.txt
//   Step 7: Report the vocabulary size the data needs
//
// All files are written next to the input unless an output
// directory is given.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::{
    chunker::Chunker,
    dataset::find_vocab_size,
    loader::JsonlLoader,
    preprocessor::Preprocessor,
    splitter::split_tail,
};
use crate::domain::error::LmError;
use crate::domain::traits::{DocumentSource, TextTokenizer};
use crate::infra::tokenizer_store::HfTokenizer;

pub const STRUCTURED_FILE: &str = "structured_data.txt";
pub const ENCODED_FILE:    &str = "encoded_data.txt";
pub const TRAIN_FILE:      &str = "training_data.txt";
pub const VAL_FILE:        &str = "validation_data.txt";
pub const TOKENIZER_FILE:  &str = "tokenizer.json";

#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub input_file:     PathBuf,
    pub output_dir:     Option<PathBuf>,
    pub context_window: usize,
    pub val_ratio:      f64,
    /// Pretrained tokenizer.json; when None a word-level one is built
    pub tokenizer:      Option<PathBuf>,
    pub max_vocab:      Option<usize>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            input_file:     PathBuf::from("data/raw_data.jsonl"),
            output_dir:     None,
            context_window: 1024,
            val_ratio:      0.1,
            tokenizer:      None,
            max_vocab:      None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub output_dir:     PathBuf,
    pub tokenizer_path: PathBuf,
    pub chunks:         usize,
    pub train_lines:    usize,
    pub val_lines:      usize,
    /// max token id + 1 over the encoded file
    pub data_vocab:     usize,
}

pub struct EncodeUseCase {
    config: EncodeConfig,
}

impl EncodeUseCase {
    pub fn new(config: EncodeConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EncodeReport> {
        let cfg = &self.config;
        if cfg.context_window == 0 {
            return Err(LmError::InvalidConfig("context_window must be positive".to_string()).into());
        }
        if !(0.0..=1.0).contains(&cfg.val_ratio) {
            return Err(LmError::InvalidConfig(format!(
                "val_ratio must be in [0, 1], got {}",
                cfg.val_ratio
            ))
            .into());
        }

        let out_dir = match &cfg.output_dir {
            Some(dir) => dir.clone(),
            None => cfg.input_file.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        if !out_dir.as_os_str().is_empty() {
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("Cannot create output directory '{}'", out_dir.display()))?;
        }

        // ── Step 1 + 2: Load and join ─────────────────────────────────────────
        let docs   = JsonlLoader::new(&cfg.input_file).load_all()?;
        let joined = docs.iter().map(|d| d.text.as_str()).collect::<Vec<_>>().join(" ");

        // ── Step 3: Chunk, flatten, write structured_data.txt ─────────────────
        let preprocessor = Preprocessor::new();
        let chunks: Vec<String> = Chunker::new(cfg.context_window)
            .chunk(&joined)
            .iter()
            .map(|c| preprocessor.clean(c))
            .filter(|c| !c.is_empty())
            .collect();
        tracing::info!("Created {} chunks of up to {} chars", chunks.len(), cfg.context_window);
        write_lines(&out_dir.join(STRUCTURED_FILE), &chunks)?;

        // ── Step 4: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = match &cfg.tokenizer {
            Some(path) => HfTokenizer::from_file(path)?,
            None => HfTokenizer::build_word_level(&chunks, cfg.max_vocab, out_dir.join(TOKENIZER_FILE))?,
        };

        // ── Step 5: Encode ────────────────────────────────────────────────────
        let mut encoded = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let ids = tokenizer.encode(chunk)?;
            encoded.push(ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" "));
        }
        let encoded_path = out_dir.join(ENCODED_FILE);
        write_lines(&encoded_path, &encoded)?;

        // ── Step 6: Split ─────────────────────────────────────────────────────
        let (train, val) = split_tail(encoded, cfg.val_ratio);
        write_lines(&out_dir.join(TRAIN_FILE), &train)?;
        write_lines(&out_dir.join(VAL_FILE), &val)?;

        // ── Step 7: Vocabulary ────────────────────────────────────────────────
        let data_vocab = find_vocab_size(&encoded_path)?;
        tracing::info!(
            "Data needs vocab_size >= {} (tokenizer has {})",
            data_vocab,
            tokenizer.vocab_size()
        );

        Ok(EncodeReport {
            output_dir:     out_dir,
            tokenizer_path: tokenizer.path().to_path_buf(),
            chunks:         chunks.len(),
            train_lines:    train.len(),
            val_lines:      val.len(),
            data_vocab,
        })
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut body = lines.join("\n");
    if !lines.is_empty() {
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote {} lines to '{}'", lines.len(), path.display());
    Ok(())
}
