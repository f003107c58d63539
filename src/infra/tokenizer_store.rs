// ============================================================
// Layer 6 - Tokenizer Store
// ============================================================
// Wraps a HuggingFace `tokenizers::Tokenizer` behind the
// TextTokenizer trait, and can build a word-level vocabulary
// from a corpus when no pretrained tokenizer.json is supplied.
//
// Word-level vocabulary layout:
//   [PAD]          = 0   (also the dataset padding token)
//   [UNK]          = 1
//   <|endoftext|>  = 2   (generation stops when sampled)
//   words          = 3.. (most frequent first, ties by spelling)
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper, so the vocabulary is written out as
// tokenizer JSON directly and loaded back with from_file.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokenizers::Tokenizer;

use crate::domain::error::LmError;
use crate::domain::traits::TextTokenizer;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const EOT_TOKEN: &str = "<|endoftext|>";

const SPECIAL_TOKENS: [&str; 3] = [PAD_TOKEN, UNK_TOKEN, EOT_TOKEN];

pub struct HfTokenizer {
    inner:      Tokenizer,
    eot:        u32,
    vocab_size: usize,
    path:       PathBuf,
}

impl HfTokenizer {
    /// Load a tokenizer.json. The file must define `<|endoftext|>`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LmError::MissingArtifact { what: "tokenizer", path: path.to_path_buf() }.into());
        }

        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {e}", path.display()))?;
        let eot = inner.token_to_id(EOT_TOKEN).with_context(|| {
            format!("Tokenizer '{}' has no '{EOT_TOKEN}' token", path.display())
        })?;

        // highest id + 1, so every id the tokenizer can emit has an embedding row
        let vocab_size = inner.get_vocab(true).values().max().map_or(0, |&id| id as usize + 1);

        tracing::info!(
            "Loaded tokenizer '{}' (vocab_size={}, eot={})",
            path.display(),
            vocab_size,
            eot
        );
        Ok(Self { inner, eot, vocab_size, path: path.to_path_buf() })
    }

    /// Build a lowercase word-level vocabulary from `texts`, write it
    /// to `path` and load it back.
    ///
    /// `max_words` caps the number of corpus words (special tokens
    /// are not counted).
    pub fn build_word_level(
        texts:     &[String],
        max_words: Option<usize>,
        path:      impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                if !SPECIAL_TOKENS.contains(&w.as_str()) {
                    *freq.entry(w).or_insert(0) += 1;
                }
            }
        }

        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(max) = max_words {
            words.truncate(max);
        }

        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (i, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(SPECIAL_TOKENS.len() + i));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| {
                serde_json::json!({
                    "id": id, "content": token, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!(
            "Built word-level tokenizer with {} words, saved to '{}'",
            words.len(),
            path.display()
        );
        Self::from_file(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("Detokenisation error: {e}"))
    }

    fn eot_token(&self) -> u32 {
        self.eot
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}
