// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The decoder and the encode pipeline only ever see these
// traits, so tests can swap in toy tokenizers and in-memory
// corpora without touching files or HuggingFace JSON.

use anyhow::Result;

use crate::domain::document::Document;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Anything that can produce the raw text records of a corpus.
///
/// Implementations:
///   - JsonlLoader -> one record per line of a .jsonl file
pub trait DocumentSource {
    fn load_all(&self) -> Result<Vec<Document>>;
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
/// Text <-> token id conversion, plus the end-of-text marker.
///
/// Must match the vocabulary the model was trained with: every id
/// returned by `encode` is expected to be below `vocab_size()`.
pub trait TextTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Id that terminates generation when sampled.
    fn eot_token(&self) -> u32;

    fn vocab_size(&self) -> usize;
}
